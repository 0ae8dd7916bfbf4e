use bench_types::{BeamAttrs, BeamIndex};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One straight run of a beam between interactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamSegment {
    pub index: BeamIndex,
    pub origin: [f64; 3],
    /// Unit direction.
    pub direction: [f64; 3],
    /// Distance to the next interaction, or the terminal length.
    pub length: f64,
    pub attrs: BeamAttrs,
    /// Component whose interface ends this segment, if any.
    pub hit: Option<Uuid>,
    /// Component whose interface emitted this segment (excluded from
    /// self-intersection).
    pub source: Option<Uuid>,
    /// True when the segment ends in a blocking region rather than an
    /// optically active interface.
    pub blocked: bool,
}

impl BeamSegment {
    pub fn endpoint(&self) -> [f64; 3] {
        [
            self.origin[0] + self.direction[0] * self.length,
            self.origin[1] + self.direction[1] * self.length,
            self.origin[2] + self.direction[2] * self.length,
        ]
    }

    /// Terminal segments carry the beam out of the scene: nothing hit,
    /// or stopped by a blocking region.
    pub fn is_terminal(&self) -> bool {
        self.hit.is_none() || self.blocked
    }
}

#[derive(Debug, Clone)]
pub struct SegmentNode {
    pub segment: BeamSegment,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Arena-backed tree of beam segments for one beam source.
///
/// Nodes are stored in creation order, which is deterministic for a
/// given scene; removed subtrees leave tombstone slots so node handles
/// stay stable within a solve.
#[derive(Debug, Clone)]
pub struct BeamTree {
    pub source: Uuid,
    slots: Vec<Option<SegmentNode>>,
}

impl BeamTree {
    pub fn new(source: Uuid) -> Self {
        Self {
            source,
            slots: Vec::new(),
        }
    }

    pub fn push(&mut self, parent: Option<usize>, segment: BeamSegment) -> usize {
        let idx = self.slots.len();
        self.slots.push(Some(SegmentNode {
            segment,
            parent,
            children: Vec::new(),
        }));
        if let Some(p) = parent {
            if let Some(Some(node)) = self.slots.get_mut(p) {
                node.children.push(idx);
            }
        }
        idx
    }

    pub fn node(&self, idx: usize) -> Option<&SegmentNode> {
        self.slots.get(idx).and_then(|s| s.as_ref())
    }

    /// Remove a node and everything below it. Returns the removed
    /// segments in creation order.
    pub fn remove_subtree(&mut self, root: usize) -> Vec<BeamSegment> {
        let mut stack = vec![root];
        let mut doomed = Vec::new();
        while let Some(idx) = stack.pop() {
            if let Some(Some(node)) = self.slots.get(idx) {
                stack.extend(node.children.iter().copied());
                doomed.push(idx);
            }
        }
        doomed.sort_unstable();

        if let Some(Some(node)) = self.slots.get(root) {
            if let Some(p) = node.parent {
                if let Some(Some(parent)) = self.slots.get_mut(p) {
                    parent.children.retain(|&c| c != root);
                }
            }
        }

        let mut removed = Vec::with_capacity(doomed.len());
        for idx in doomed {
            if let Some(node) = self.slots[idx].take() {
                removed.push(node.segment);
            }
        }
        removed
    }

    /// Live nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (usize, &SegmentNode)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|n| (i, n)))
    }

    /// Live segments in creation order.
    pub fn segments(&self) -> impl Iterator<Item = &BeamSegment> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref().map(|n| &n.segment))
    }

    pub fn segments_at(&self, index: BeamIndex) -> Vec<&BeamSegment> {
        self.segments().filter(|s| s.index == index).collect()
    }

    pub fn terminals(&self) -> Vec<&BeamSegment> {
        self.segments().filter(|s| s.is_terminal()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Interface interaction model.
//!
//! Maps a winning interaction to 0-2 outgoing rays. Each `Behavior`
//! variant implements one uniform "compute outputs" contract; power,
//! polarization and focus attributes are updated per branch.

use bench_types::{BeamAttrs, Behavior};
use nalgebra::{Rotation3, Vector3};
use std::f64::consts::FRAC_PI_2;
use tracing::debug;

use crate::GEOM_EPS;

/// Which side of a split a ray belongs to. Determines the child beam
/// index when both branches are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Transmitted,
    Reflected,
}

/// One ray leaving an interface.
#[derive(Debug, Clone)]
pub struct OutgoingRay {
    pub direction: Vector3<f64>,
    pub attrs: BeamAttrs,
    pub branch: BranchKind,
}

/// Mirror law: reflect `d` about the interface normal.
pub fn reflect(d: &Vector3<f64>, normal: &Vector3<f64>) -> Vector3<f64> {
    d - normal * (2.0 * d.dot(normal))
}

/// Compute the outgoing rays for an interaction.
///
/// `incoming` must be unit length, `normal` is the interface plane
/// normal, and `hit_offset` is the hit point relative to the component
/// center (used by lenses for the radial decomposition).
pub fn interface_outputs(
    behavior: &Behavior,
    incoming: &Vector3<f64>,
    normal: &Vector3<f64>,
    hit_offset: &Vector3<f64>,
    attrs: &BeamAttrs,
) -> Vec<OutgoingRay> {
    match behavior {
        Behavior::Mirror => vec![OutgoingRay {
            direction: reflect(incoming, normal),
            attrs: *attrs,
            branch: BranchKind::Reflected,
        }],

        Behavior::Sampler { ratio } => {
            let mut out = Vec::with_capacity(2);
            let transmitted_power = attrs.power * (1.0 - ratio);
            let reflected_power = attrs.power * ratio;
            if transmitted_power > 0.0 {
                out.push(OutgoingRay {
                    direction: *incoming,
                    attrs: attrs.scaled_power(1.0 - ratio),
                    branch: BranchKind::Transmitted,
                });
            }
            if reflected_power > 0.0 {
                out.push(OutgoingRay {
                    direction: reflect(incoming, normal),
                    attrs: attrs.scaled_power(*ratio),
                    branch: BranchKind::Reflected,
                });
            }
            out
        }

        Behavior::Polarizer { angle } => {
            // A beam with no polarization attribute is taken as aligned
            // with the transmission axis.
            let pol = attrs.polarization.unwrap_or(*angle);
            let transmitted_fraction = (pol - angle).cos().powi(2);
            let mut out = Vec::with_capacity(2);
            if transmitted_fraction > 0.0 {
                let mut t_attrs = attrs.scaled_power(transmitted_fraction);
                t_attrs.polarization = Some(*angle);
                out.push(OutgoingRay {
                    direction: *incoming,
                    attrs: t_attrs,
                    branch: BranchKind::Transmitted,
                });
            }
            let reflected_fraction = 1.0 - transmitted_fraction;
            if reflected_fraction > 0.0 {
                let mut r_attrs = attrs.scaled_power(reflected_fraction);
                r_attrs.polarization = Some(angle + FRAC_PI_2);
                out.push(OutgoingRay {
                    direction: reflect(incoming, normal),
                    attrs: r_attrs,
                    branch: BranchKind::Reflected,
                });
            }
            out
        }

        Behavior::Dichroic { ranges } => {
            let reflects = match attrs.wavelength {
                Some(wl) => ranges.iter().any(|r| r.contains(wl)),
                None => {
                    debug!("dichroic hit by beam with no wavelength, transmitting");
                    false
                }
            };
            if reflects {
                vec![OutgoingRay {
                    direction: reflect(incoming, normal),
                    attrs: *attrs,
                    branch: BranchKind::Reflected,
                }]
            } else {
                vec![OutgoingRay {
                    direction: *incoming,
                    attrs: *attrs,
                    branch: BranchKind::Transmitted,
                }]
            }
        }

        Behavior::Lens { focal_length } => {
            // Paraxial thin lens: transverse position is unchanged and
            // the transverse slope drops by r/f. In vector form
            // d' = normalize(d - r_perp * |d.n| / f).
            let axial = incoming.dot(normal).abs();
            let r_perp = hit_offset - normal * hit_offset.dot(normal);
            let bent = incoming - r_perp * (axial / focal_length);
            let direction = if bent.norm() > GEOM_EPS {
                bent.normalize()
            } else {
                *incoming
            };
            let mut out_attrs = *attrs;
            let waist = attrs.waist.unwrap_or(0.0);
            out_attrs.focal_rate =
                Some(attrs.focal_rate.unwrap_or(0.0) - waist / focal_length);
            vec![OutgoingRay {
                direction,
                attrs: out_attrs,
                branch: BranchKind::Transmitted,
            }]
        }

        Behavior::Diffractor { angle, directional } => {
            // Fixed angular offset from the transmitted axis, rotated
            // about the vertical. With `directional`, the sign follows
            // the incidence side (the sign of d . tangent).
            let tangent = Vector3::z().cross(normal);
            let sign = if *directional && incoming.dot(&tangent) < 0.0 {
                -1.0
            } else {
                1.0
            };
            let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), sign * angle);
            vec![OutgoingRay {
                direction: rot * incoming,
                attrs: *attrs,
                branch: BranchKind::Transmitted,
            }]
        }

        Behavior::Transmissive => vec![OutgoingRay {
            direction: *incoming,
            attrs: *attrs,
            branch: BranchKind::Transmitted,
        }],
    }
}

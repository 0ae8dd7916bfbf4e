pub mod beam;
pub mod interface;
pub mod placement;
pub mod pose;

pub use beam::*;
pub use interface::*;
pub use placement::*;
pub use pose::*;

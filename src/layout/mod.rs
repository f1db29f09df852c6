pub mod animation;
pub mod routing;
pub mod tidy;
pub(crate) mod types;

pub use animation::Animator;
pub use routing::{child_anchor_point, route};
pub use tidy::{TidyEngine, shift_subtrees};
pub use types::*;

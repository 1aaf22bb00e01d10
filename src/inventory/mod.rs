//! Cross-listing seat state engine.

pub mod category;
pub mod hierarchy;
pub mod index;
pub mod propagation;
pub mod state;

pub use hierarchy::RelationshipGraph;
pub use index::SeatIndex;
pub use propagation::{PropagationAction, PropagationPlan};
pub use state::{effective_state, SeatAction, SeatState, TransitionError};

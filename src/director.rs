pub mod behavior;
pub mod queue;
pub mod stage;

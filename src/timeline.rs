pub mod compositor;
pub mod span;

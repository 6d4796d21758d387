pub mod ease;
pub mod rng;

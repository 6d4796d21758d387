pub mod crossfade;
pub mod cycles;
pub mod stitch;

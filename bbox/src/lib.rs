//! Region-of-interest and facial landmark types.

pub use roi::*;
pub mod roi;

pub use landmarks::*;
pub mod landmarks;

//! Session layer: buffered reads, prompt matching, and device error patterns.

mod buffer;
mod patterns;
mod session;

pub use buffer::PatternBuffer;
pub use patterns::{ErrorMatch, ErrorPatternSet, GENERIC_PROMPT, prompt_pattern_for};
pub use session::{Session, SessionOptions};

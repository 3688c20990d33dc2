//! Subtitle translation with structural validation.
//!
//! [`srt`] parses caption files, [`validate`] checks a translation against
//! its source, and [`translate`] drives an LLM translator around them.

pub mod archive;
pub mod cost;
pub mod discover;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod srt;
pub mod translate;
pub mod validate;

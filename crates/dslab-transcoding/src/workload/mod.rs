//! Sources of transcoding jobs.

pub mod generator;
pub mod source;
pub mod trace;

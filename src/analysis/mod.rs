//! Result analysis.

pub mod quality;

//! Run reports.
//!
//! This module provides:
//! - `Report` and `Summary`, built from load errors, name conflicts and a
//!   verification run
//! - Human and JSON rendering

mod builder;
mod render;

pub use builder::{Report, Summary};
pub use render::{render, render_human, render_json, OutputFormat};

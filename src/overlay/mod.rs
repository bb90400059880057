//! # Overlay Module
//!
//! Renders the tracking marker, its trail, the speed label and the clip
//! summary onto frames.

pub mod annotator;
pub mod glyphs;

pub use annotator::{average_label, count_label, speed_label, Annotator};

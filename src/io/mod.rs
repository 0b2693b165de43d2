//! Input/output helpers.
//!
//! - plain-text titration and sample ingest (`ingest`)
//! - per-point result export to CSV (`export`)
//! - fit JSON read/write (`fitfile`)

pub mod export;
pub mod fitfile;
pub mod ingest;

pub use export::*;
pub use fitfile::*;
pub use ingest::*;

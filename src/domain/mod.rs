//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - titration observations (`TitrationPoint`, `TitrationSeries`)
//! - fixed experiment constants (`DirectAssay`, `CompetitionAssay`, `SignalBounds`)
//! - fit outputs (`FitParams`, `FitResult`, `FitFile`, etc.)
//! - run configurations derived from the CLI

pub mod types;

pub use types::*;

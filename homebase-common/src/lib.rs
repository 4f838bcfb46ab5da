//! # Homebase Common Library
//!
//! Shared code for the Homebase feed proxy and watch client including:
//! - Canonical state vector and feed snapshot types (wire format)
//! - Unit conversions (the single home of every scale factor)
//! - Geodesy helpers for containment tests
//! - Configuration file resolution and loading
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod geo;
pub mod state;
pub mod time;
pub mod units;

pub use error::{Error, Result};
pub use state::{FeedSnapshot, StateVector};

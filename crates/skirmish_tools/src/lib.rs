//! # Skirmish Development Tools
//!
//! Command-line helpers around the combat core:
//! - Role table validation
//! - Headless scenario runs that print combat events as JSON lines

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod scenario;
pub mod validate;

pub use error::{Result, ToolError};

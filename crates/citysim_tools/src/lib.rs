//! # Citysim Development Tools
//!
//! Command-line tools for development:
//! - Rule file validation
//! - Headless soak runs across many seeds

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod soak;
pub mod validate;

//! Core domain model for sampledex.
//!
//! This crate defines the sample record and its metadata, the on-disk
//! sample store (SQLite schema plus exact nearest-neighbour queries), and
//! translation between drive-letter and mount-point path conventions.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod paths;
pub mod schema;

pub use error::{Error, Result};

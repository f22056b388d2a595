//! Natural-language sample search for sampledex.
//!
//! Embeds a text query with the same model that embedded the samples,
//! runs an exact nearest-neighbour query against the sample store, and
//! filters the candidates by name, similarity, tempo, key, format and
//! duration.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod filter;
pub mod searcher;

pub use error::{Error, Result};
pub use filter::{similarity_percent, SearchFilters, SimilarityBand};
pub use searcher::{SearchHit, Searcher};

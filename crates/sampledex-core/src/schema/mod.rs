pub mod db;
pub mod migrations;
pub mod vector;

pub use db::{Neighbor, SampleStore, StoreStats, STORE_FILE};

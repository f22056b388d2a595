pub mod config;
pub mod db;
pub mod index;
pub mod path;
pub mod reanalyze;
pub mod remote;
pub mod search;
pub mod status;

pub use index::run_index;
pub use reanalyze::run_reanalyze;
pub use remote::run_remote;
pub use search::run_search;
pub use status::show_status;

pub mod errors;
pub mod table;

pub use errors::{extract_clean_error, WatchError};
pub use table::Table;

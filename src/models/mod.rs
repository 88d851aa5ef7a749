//! Data models shared by every adapter.
//!
//! - [`Record`]: the dynamically shaped unit callers send and receive
//! - [`QueryDescriptor`]: the parsed filter/search/sort/pagination portion of a request

pub mod query;
mod record;

pub use query::{QueryDescriptor, SortDirection, SortKey, extract_id, extract_ids};
pub use record::{Record, compare_values, value_as_i64, value_to_string, values_match};

//! Storage adapter traits.

mod adapter;

pub use adapter::Adapter;
pub(crate) use adapter::parse_descriptor;

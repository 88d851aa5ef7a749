//! Storage adapters.
//!
//! Three interchangeable backends implement one [`Adapter`] contract:
//! - **Embedded**: in-process indexed tables (`redb`)
//! - **Document**: a remote collection (`MongoDB`)
//! - **Relational**: a pooled embedded SQL engine (`SQLite`)
//!
//! Each adapter instance owns its connection state end to end; nothing is
//! shared between instances.

// Allow significant_drop_tightening - holding a pooled connection or
// transaction to the end of scope is harmless.
#![allow(clippy::significant_drop_tightening)]
// Allow match_same_arms for explicit type dispatch.
#![allow(clippy::match_same_arms)]

pub mod document;
pub mod embedded;
pub mod metrics;
pub mod relational;
mod state;
pub mod traits;

pub use document::{DocumentAdapter, DocumentConfig};
pub use embedded::{
    EmbeddedAdapter, EmbeddedConfig, IdGenerator, IndexKeyCodec, IndexSpec, RandomIdGenerator,
};
pub use metrics::record_operation_metrics;
pub use relational::{
    Column, ColumnNames, ColumnType, OpenFlag, RelationalAdapter, RelationalConfig,
};
pub use traits::Adapter;

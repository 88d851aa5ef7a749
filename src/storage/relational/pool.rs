//! `SQLite` connection pool.
//!
//! Connections come from an `r2d2` pool built over
//! [`SqliteConnectionManager`]. Checkout waits for an idle connection with a
//! very long timeout, so a starved pool applies backpressure instead of
//! failing. Every new connection is configured by [`configure_connection`].
//!
//! A private in-memory database (`:memory:`, an empty path, or a
//! `mode=memory` URI without `cache=shared`) would give each pooled
//! connection its own database. Those locations are opened through
//! [`SqliteConnectionManager::memory`] instead, which names one shared-cache
//! database per pool. Shared-cache table locks fail at once rather than
//! waiting on the busy timeout, so an in-memory pool holds one connection.
//! Connections are never recycled.

use crate::{Error, Result};
use r2d2::{ManageConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::time::{Duration, Instant};

/// How long a checkout waits for an idle connection.
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Configures a pooled connection.
///
/// # Configuration Applied
///
/// - **WAL mode**: concurrent readers alongside the single writer
/// - **NORMAL synchronous**: balances durability with performance
/// - **busy timeout**: waits for engine locks instead of failing with `SQLITE_BUSY`
///
/// In-memory databases reject WAL; that pragma is best effort.
pub(crate) fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
        tracing::debug!(error = %e, "journal_mode=WAL not applied");
    }
    if let Err(e) = conn.pragma_update(None, "synchronous", "NORMAL") {
        tracing::debug!(error = %e, "synchronous=NORMAL not applied");
    }
    conn.busy_timeout(busy_timeout)
}

/// Returns true if `uri` names a database that lives only in memory.
pub(crate) fn is_memory(uri: &str, flags: OpenFlags) -> bool {
    uri.is_empty()
        || uri == ":memory:"
        || flags.contains(OpenFlags::SQLITE_OPEN_MEMORY)
        || uri.starts_with("file::memory:")
        || (uri.starts_with("file:") && uri.contains("mode=memory"))
}

/// Returns true if every connection to `uri` would open a separate database.
pub(crate) fn is_private_memory(uri: &str, flags: OpenFlags) -> bool {
    let shared = uri.contains("cache=shared") || flags.contains(OpenFlags::SQLITE_OPEN_SHARED_CACHE);
    is_memory(uri, flags) && (!shared || uri.is_empty() || uri == ":memory:")
}

fn manager_for(uri: &str, flags: OpenFlags) -> SqliteConnectionManager {
    if is_private_memory(uri, flags) {
        tracing::debug!(uri, "private in-memory database, sharing it across the pool");
        let flags = (flags - OpenFlags::SQLITE_OPEN_MEMORY) | OpenFlags::SQLITE_OPEN_URI;
        SqliteConnectionManager::memory().with_flags(flags)
    } else {
        SqliteConnectionManager::file(uri).with_flags(flags)
    }
}

/// Pool of `SQLite` connections to one database.
pub(crate) struct ConnectionPool {
    inner: Pool<SqliteConnectionManager>,
}

impl ConnectionPool {
    /// Opens a pool of `size` connections to `uri`.
    ///
    /// The size is at least one, and exactly one for in-memory databases.
    pub(crate) fn open(
        uri: &str,
        flags: OpenFlags,
        size: usize,
        busy_timeout: Duration,
    ) -> Result<Self> {
        let connection_failed = |e: &dyn std::fmt::Display| Error::ConnectionFailed {
            backend: super::BACKEND,
            cause: format!("cannot open '{uri}': {e}"),
        };
        let manager = manager_for(uri, flags)
            .with_init(move |conn| configure_connection(conn, busy_timeout));

        // r2d2 retries a failing open until the checkout timeout, so a bad
        // location is reported here instead.
        manager.connect().map_err(|e| connection_failed(&e))?;

        let size = if is_memory(uri, flags) && size > 1 {
            tracing::warn!(uri, requested = size, "in-memory database, pooling one connection");
            1
        } else {
            size.max(1)
        };
        let inner = Pool::builder()
            .max_size(u32::try_from(size).unwrap_or(u32::MAX))
            .connection_timeout(CHECKOUT_TIMEOUT)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)
            .map_err(|e| connection_failed(&e))?;
        Ok(Self { inner })
    }

    /// Number of connections the pool may hold.
    pub(crate) fn size(&self) -> usize {
        self.inner.max_size() as usize
    }

    /// Runs `f` on a checked-out connection.
    ///
    /// The connection goes back to the pool when `f` returns, whether it
    /// succeeded, failed or panicked.
    pub(crate) fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        let started = Instant::now();
        let mut conn = self.inner.get().map_err(|e| {
            tracing::error!(error = %e, "SQLite pool checkout failed");
            metrics::counter!("sqlite_pool_checkout_failures_total").increment(1);
            Error::Timeout {
                operation: "checkout".to_string(),
                timeout: CHECKOUT_TIMEOUT,
            }
        })?;
        metrics::histogram!("sqlite_pool_checkout_duration_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        f(&mut conn)
    }
}

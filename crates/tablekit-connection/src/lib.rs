//! Connection management for tablekit
//!
//! Every logical request borrows one pooled connection for its lifetime and
//! returns it on drop, matching the engine's scoped-acquisition model.

pub mod pool;

pub use pool::{ConnectionFactory, ConnectionPool, PoolConfig, PoolStats, PooledConnection};

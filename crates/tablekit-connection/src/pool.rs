//! Connection pooling for database connections
//!
//! Pool sizing, timeouts, and statistics tracking. Connections are acquired
//! for the duration of one logical operation and returned on drop.
//!
//! # Example
//!
//! ```ignore
//! use tablekit_connection::pool::{ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new(1, 8).with_acquire_timeout_ms(5000);
//! let pool = ConnectionPool::new(config, factory);
//! let conn = pool.get().await?;
//! // connection returned to the pool on drop
//! ```

mod config;
mod inner;
mod stats;


pub use config::PoolConfig;
pub use inner::{ConnectionFactory, ConnectionPool, PooledConnection};
pub use stats::PoolStats;

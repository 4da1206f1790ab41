//! Shared store abstraction.
//!
//! Every piece of cross-process state (queues, incidents, agents, circuit
//! breaker) lives behind the [`SharedStore`] trait. The production backend
//! is Redis; [`MemoryStore`] implements the same contract in-process for
//! unit tests and store-less local runs.

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod traits;
pub mod unavailable;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use traits::SharedStore;
pub use unavailable::UnavailableStore;

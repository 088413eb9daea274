//! # aiorx: async reactive streams for single-threaded executors
//!
//! Producers ([`Observable`]s) hand values and errors to consumers
//! ([`Observer`]s) through async calls, then close them. Sends into one observer are
//! served strictly in the order they were made, even when many producers
//! race on it.
//!
//! ## Quick Start
//!
//! ```rust
//! use aiorx::prelude::*;
//! use futures::executor::LocalPool;
//!
//! let mut pool = LocalPool::new();
//! let scheduler = Scheduler::from(pool.spawner());
//!
//! let first_even = observable::from_iter([1, 3, 4, 6])
//!   .concat(observable::unit(8))
//!   .filter(|v| v % 2 == 0);
//!
//! assert_eq!(pool.run_until(first_even.consume(&scheduler)).unwrap(), 4);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Scheduler`] | Handle to the executor every background task is spawned on |
//! | [`Observable`] | Wires an observer in and returns a [`Subscription`] |
//! | [`Observer`] | Consumes `asend`, `araise` and `aclose` |
//! | [`Promise`] | Awaitable single-assignment result, used for observer outcomes |
//! | [`SingleStream`] / [`MultiStream`] | Observers that relay to their subscribers |
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): build a [`Scheduler`] from a
//!   `futures::executor::LocalSpawner`
//! - **`tokio-scheduler`**: spawn through `tokio::task::spawn_local` with
//!   [`TokioLocal`](scheduler::TokioLocal)
//!
//! [`Observable`]: observable::Observable
//! [`Observer`]: observer::Observer
//! [`Subscription`]: disposable::Subscription
//! [`Scheduler`]: scheduler::Scheduler
//! [`Promise`]: promise::Promise
//! [`SingleStream`]: stream::SingleStream
//! [`MultiStream`]: stream::MultiStream

pub mod disposable;
pub mod error;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod promise;
pub mod scheduler;
pub mod stream;

pub use prelude::*;

/// Version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Error type shared by every part of the crate.
//!
//! Errors are `Clone`: a settled [`Promise`](crate::promise::Promise) hands
//! its rejection to every awaiter, and a
//! [`MultiStream`](crate::stream::MultiStream) fans one error out to many
//! observers.

use std::{error::Error as StdError, sync::Arc};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
  /// An observer was used after it was closed.
  #[error("{0} is closed")]
  ObserverClosed(&'static str),

  /// A single-subscriber stream was subscribed a second time.
  #[error("single stream can only be subscribed once")]
  SingleStream,

  /// Delivery to one or more subscribers of a multi stream failed.
  #[error("delivery failed for {} multi stream subscriber(s)", .0.len())]
  MultiStream(Vec<Error>),

  /// One or more disposals of a composite failed.
  #[error("{} disposal(s) failed", .0.len())]
  Dispose(Vec<Error>),

  /// A promise was resolved or rejected after it had already settled.
  #[error("promise is already settled")]
  InvalidState,

  /// The awaited promise was cancelled.
  #[error("promise was cancelled")]
  Cancelled,

  /// The scheduler refused to spawn a task.
  #[error("scheduler is shut down")]
  SchedulerShutdown,

  #[error(transparent)]
  Custom(Arc<dyn StdError + Send + Sync>),
}

impl Error {
  /// Wrap any user error so it can travel through observers and promises.
  pub fn custom<E>(err: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    Error::Custom(Arc::new(err))
  }

  /// Returns the wrapped user error, if this is one.
  pub fn as_custom(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
    match self {
      Error::Custom(err) => Some(err.as_ref()),
      _ => None,
    }
  }

  /// Errors caused by misusing the API rather than by data flowing through it.
  pub fn is_usage(&self) -> bool { matches!(self, Error::ObserverClosed(_) | Error::SingleStream) }
}

impl From<futures::task::SpawnError> for Error {
  fn from(_: futures::task::SpawnError) -> Self { Error::SchedulerShutdown }
}

//! Streams are observers and observables at once: whatever they receive is
//! relayed to the observers currently subscribed to them.
//!
//! [`SingleStream`] accepts one subscription in its lifetime and is the sink
//! operators build internally. [`MultiStream`] fans out to any number of
//! subscribers.

use tracing::warn;

use crate::{
  disposable::{AnonymousDisposable, Subscription},
  error::Result,
  observer::ObserverRef,
};

mod multi;
mod single;
mod subscribers;

pub use multi::MultiStream;
pub use single::SingleStream;

// A closed stream has nothing left to relay, so a new subscriber is closed
// right away on its own scheduler.
fn close_late_subscriber<K: 'static>(observer: ObserverRef<K>) -> Result<Subscription> {
  let scheduler = observer.scheduler().clone();
  let spawned = scheduler.spawn(async move {
    observer.aclose().await;
  });
  if let Err(err) = spawned {
    warn!(error = %err, "could not close subscriber of a closed stream");
    return Err(err);
  }
  Ok(Box::new(AnonymousDisposable::from_fn(|| {})))
}

//! Operators built from internal sinks placed between a source and the
//! observer handed to `observe`.

use tracing::warn;

use crate::{
  disposable::{CompositeDisposable, Disposable, DisposePolicy},
  scheduler::Scheduler,
};

pub mod concat;
pub mod filter;

pub use concat::{concat, concat_op, Concat};
pub use filter::{filter, filter_op, Filter};

// Tear down a subscription whose setup failed part way. Failures are only
// logged: the setup error is what the caller gets back.
fn dispose_in_background(scheduler: &Scheduler, partial: CompositeDisposable) {
  let partial = partial.with_policy(DisposePolicy::Warn);
  if let Err(err) = scheduler.spawn(async move {
    let _ = partial.dispose().await;
  }) {
    warn!(error = %err, "could not schedule disposal of a partial subscription");
  }
}

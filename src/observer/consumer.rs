use std::rc::{Rc, Weak};

use futures::{
  future::{self, LocalBoxFuture},
  FutureExt,
};

use super::{ObserverCore, ObserverHooks};
use crate::{
  disposable::Disposable,
  error::{Error, Result},
  observable::{observe, Observable},
  promise::Promise,
  scheduler::Scheduler,
};

/// Observer that resolves with the first value it receives.
///
/// Every error is terminal and rejects the result. Closing before any value
/// arrived leaves the result cancelled.
pub struct Consumer<K> {
  core: ObserverCore<K>,
}

impl<K: Clone + 'static> Consumer<K> {
  pub fn new(scheduler: &Scheduler) -> Rc<Self> {
    Rc::new_cyclic(|this: &Weak<Self>| Consumer {
      core: ObserverCore::new::<K>("Consumer", scheduler, this.clone()),
    })
  }

  pub fn result(&self) -> Promise<K> { self.core.result() }
}

impl<K: Clone + 'static> ObserverHooks<K> for Consumer<K> {
  type Output = K;

  fn core(&self) -> &ObserverCore<K> { &self.core }

  fn on_send(&self, value: K) -> LocalBoxFuture<'_, Result<()>> {
    // Only reachable while the result is pending: a settled result closes
    // the observer before the gate admits another send.
    future::ready(self.core.result.resolve(value)).boxed_local()
  }

  fn on_raise(&self, _: Error) -> LocalBoxFuture<'_, Result<bool>> { future::ok(true).boxed_local() }

  fn on_close(&self) -> LocalBoxFuture<'_, ()> { future::ready(()).boxed_local() }
}

/// Subscribe a [`Consumer`] to `observable` and wait for its first value.
///
/// The subscription is disposed before returning. An observable that
/// completes without a value yields [`Error::Cancelled`].
pub async fn consume<K, O>(observable: &O, scheduler: &Scheduler) -> Result<K>
where
  K: Clone + 'static,
  O: Observable<K> + ?Sized,
{
  let consumer = Consumer::new(scheduler);
  let subscription = observe(observable, consumer.clone())?;
  let outcome = consumer.result().await;
  let disposed = subscription.dispose().await;
  let value = outcome?;
  disposed.map(|_| value)
}

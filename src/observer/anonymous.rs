use std::{
  cell::RefCell,
  rc::{Rc, Weak},
};

use futures::{
  future::{self, LocalBoxFuture},
  FutureExt,
};

use super::{ObserverCore, ObserverHooks};
use crate::{
  error::{Error, Result},
  promise::Promise,
  scheduler::Scheduler,
};

type NextFn<K> = Box<dyn FnMut(K) -> Result<()>>;

/// Observer built from a closure called with every value.
///
/// Errors are terminal. The result resolves to `()` when the observer is
/// closed and is rejected by a terminal error.
pub struct AnonymousObserver<K> {
  core: ObserverCore<()>,
  next: RefCell<NextFn<K>>,
}

impl<K: 'static> AnonymousObserver<K> {
  pub fn new<F>(scheduler: &Scheduler, next: F) -> Rc<Self>
  where
    F: FnMut(K) -> Result<()> + 'static,
  {
    Rc::new_cyclic(|this: &Weak<Self>| AnonymousObserver {
      core: ObserverCore::new::<K>("AnonymousObserver", scheduler, this.clone()),
      next: RefCell::new(Box::new(next)),
    })
  }

  pub fn result(&self) -> Promise<()> { self.core.result() }
}

impl<K: 'static> ObserverHooks<K> for AnonymousObserver<K> {
  type Output = ();

  fn core(&self) -> &ObserverCore<()> { &self.core }

  fn on_send(&self, value: K) -> LocalBoxFuture<'_, Result<()>> {
    let outcome = (*self.next.borrow_mut())(value);
    future::ready(outcome).boxed_local()
  }

  fn on_raise(&self, _: Error) -> LocalBoxFuture<'_, Result<bool>> { future::ok(true).boxed_local() }

  fn on_close(&self) -> LocalBoxFuture<'_, ()> {
    let _ = self.core.result.resolve(());
    future::ready(()).boxed_local()
  }
}

//! Disposables undo subscriptions.
//!
//! Every call to [`observe`](crate::observable::observe) returns a
//! [`Subscription`]. Disposing it releases whatever that one subscription
//! holds: a spawned worker, a slot in a stream, the internal sinks of an
//! operator. Composite subscriptions are built with [`CompositeDisposable`].

use std::cell::{Cell, RefCell};

use futures::{
  future::{AbortHandle, LocalBoxFuture},
  FutureExt,
};

use crate::{error::Result, observer::Observer};

mod composite;
pub use composite::{CompositeDisposable, DisposePolicy};

/// Handle to release a resource.
///
/// Disposing must be idempotent: a second call is a successful no-op.
pub trait Disposable {
  fn dispose(&self) -> LocalBoxFuture<'_, Result<()>>;

  fn is_disposed(&self) -> bool;
}

/// Boxed disposable returned by every subscription.
pub type Subscription = Box<dyn Disposable>;

type DisposeFn = Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<()>>>;

/// Disposable that runs a closure the first time it is disposed.
pub struct AnonymousDisposable {
  action: RefCell<Option<DisposeFn>>,
}

impl AnonymousDisposable {
  pub fn new<F>(action: F) -> Self
  where
    F: FnOnce() -> LocalBoxFuture<'static, Result<()>> + 'static,
  {
    AnonymousDisposable { action: RefCell::new(Some(Box::new(action))) }
  }

  /// Disposable whose action cannot fail or suspend.
  pub fn from_fn<F: FnOnce() + 'static>(action: F) -> Self {
    Self::new(move || {
      action();
      futures::future::ok(()).boxed_local()
    })
  }
}

impl Disposable for AnonymousDisposable {
  fn dispose(&self) -> LocalBoxFuture<'_, Result<()>> {
    let action = self.action.borrow_mut().take();
    Box::pin(async move {
      match action {
        Some(action) => action().await,
        None => Ok(()),
      }
    })
  }

  fn is_disposed(&self) -> bool { self.action.borrow().is_none() }
}

/// Disposable that aborts a task spawned through
/// [`Scheduler::spawn_abortable`](crate::scheduler::Scheduler::spawn_abortable).
pub struct TaskDisposable {
  handle: AbortHandle,
  disposed: Cell<bool>,
}

impl TaskDisposable {
  pub fn new(handle: AbortHandle) -> Self { TaskDisposable { handle, disposed: Cell::new(false) } }
}

impl Disposable for TaskDisposable {
  fn dispose(&self) -> LocalBoxFuture<'_, Result<()>> {
    if !self.disposed.replace(true) {
      self.handle.abort();
    }
    Box::pin(futures::future::ok(()))
  }

  fn is_disposed(&self) -> bool { self.disposed.get() }
}

/// Disposing an observer closes it.
impl<K: 'static> Disposable for std::rc::Rc<dyn Observer<K>> {
  fn dispose(&self) -> LocalBoxFuture<'_, Result<()>> {
    Box::pin(async move {
      self.aclose().await;
      Ok(())
    })
  }

  fn is_disposed(&self) -> bool { self.is_closed() }
}

//! Observer capability and the machinery shared by every observer.
//!
//! [`Observer`] is the object-safe interface producers talk to: `asend`,
//! `araise`, `aclose`. Concrete observers do not implement it directly.
//! They implement [`ObserverHooks`], supplying an [`ObserverCore`] plus the
//! variant-specific `on_send`/`on_raise`/`on_close`, and the blanket impl
//! wraps those hooks with the shared protocol:
//!
//! - `asend` takes a ticket at call time and waits at the core's gate, so
//!   concurrent sends are handled in the order they were made;
//! - `araise` is not gated; when the hook reports the error as terminal the
//!   core's result promise is rejected;
//! - `aclose` runs once, then cancels the result if still pending;
//! - a result settled from anywhere closes the observer on the next turn of
//!   its scheduler.

use std::{
  cell::Cell,
  rc::{Rc, Weak},
};

use futures::{
  future::{self, LocalBoxFuture},
  FutureExt,
};
use tracing::{debug, trace, warn};

use crate::{
  error::{Error, Result},
  promise::{CallbackId, Promise},
  scheduler::Scheduler,
};

mod anonymous;
mod consumer;
mod gate;

pub use anonymous::AnonymousObserver;
pub use consumer::{consume, Consumer};
pub(crate) use gate::Gate;

/// Consumer side of a subscription.
pub trait Observer<K> {
  /// Deliver one value.
  ///
  /// Fails with [`Error::ObserverClosed`] once the observer is closed.
  fn asend(&self, value: K) -> LocalBoxFuture<'_, Result<()>>;

  /// Deliver an error. Resolves to whether the observer treats it as
  /// terminal.
  fn araise(&self, err: Error) -> LocalBoxFuture<'_, Result<bool>>;

  /// Close the observer. Resolves to `false` if it was already closed.
  fn aclose(&self) -> LocalBoxFuture<'_, bool>;

  fn is_closed(&self) -> bool;

  /// Name used in errors and log events, such as `"Consumer"`.
  fn name(&self) -> &'static str;

  /// Scheduler this observer was built with.
  fn scheduler(&self) -> &Scheduler;
}

/// Shared handle to a type-erased observer.
pub type ObserverRef<K> = Rc<dyn Observer<K>>;

/// Variant-specific behaviour behind the [`Observer`] protocol.
pub trait ObserverHooks<K>: 'static {
  type Output: 'static;

  fn core(&self) -> &ObserverCore<Self::Output>;

  /// Handle a value that passed the gate.
  fn on_send(&self, value: K) -> LocalBoxFuture<'_, Result<()>>;

  /// Handle an error; `Ok(true)` makes it terminal.
  fn on_raise(&self, err: Error) -> LocalBoxFuture<'_, Result<bool>>;

  /// Release whatever the variant holds. Runs at most once.
  fn on_close(&self) -> LocalBoxFuture<'_, ()>;
}

/// State every observer carries: closed flag, ordering gate and result.
pub struct ObserverCore<L> {
  name: &'static str,
  closed: Cell<bool>,
  gate: Gate,
  result: Promise<L>,
  auto_close: Cell<Option<CallbackId>>,
}

impl<L: 'static> ObserverCore<L> {
  /// Build the core of the observer `this` points at.
  ///
  /// Meant to be called inside [`Rc::new_cyclic`]. Settling the result
  /// schedules `this.aclose()` on `scheduler`.
  pub fn new<K: 'static>(
    name: &'static str, scheduler: &Scheduler, this: Weak<dyn Observer<K>>,
  ) -> Self {
    let result = Promise::new(scheduler);
    let spawner = scheduler.clone();
    let auto_close = result.add_done_callback(move || {
      let Some(observer) = this.upgrade() else { return };
      let spawned = spawner.spawn(async move {
        observer.aclose().await;
      });
      if let Err(err) = spawned {
        warn!(observer = name, error = %err, "could not schedule close after resolution");
      }
    });
    ObserverCore {
      name,
      closed: Cell::new(false),
      gate: Gate::default(),
      result,
      auto_close: Cell::new(Some(auto_close)),
    }
  }

  /// Promise the observer resolves to.
  pub fn result(&self) -> Promise<L> { self.result.clone() }

  pub fn name(&self) -> &'static str { self.name }

  pub fn scheduler(&self) -> &Scheduler { self.result.scheduler() }

  pub fn is_closed(&self) -> bool { self.closed.get() || self.result.is_done() }

  /// Sends waiting at, or holding, the gate.
  pub fn pending_sends(&self) -> u64 { self.gate.queued() }

  fn ensure_open(&self) -> Result<()> {
    if self.is_closed() { Err(Error::ObserverClosed(self.name)) } else { Ok(()) }
  }

  // Flip to closed and detach the auto-close callback. False if already closed.
  fn begin_close(&self) -> bool {
    if self.closed.replace(true) {
      return false;
    }
    if let Some(id) = self.auto_close.take() {
      self.result.remove_done_callback(id);
    }
    true
  }
}

impl<K: 'static, H: ObserverHooks<K>> Observer<K> for H {
  fn asend(&self, value: K) -> LocalBoxFuture<'_, Result<()>> {
    let core = self.core();
    if let Err(err) = core.ensure_open() {
      return future::err(err).boxed_local();
    }
    let ticket = core.gate.ticket();
    async move {
      let _pass = ticket.await;
      core.ensure_open()?;
      trace!(observer = core.name, "send");
      self.on_send(value).await
    }
    .boxed_local()
  }

  fn araise(&self, err: Error) -> LocalBoxFuture<'_, Result<bool>> {
    async move {
      let core = self.core();
      core.ensure_open()?;
      debug!(observer = core.name, error = %err, "raise");
      let terminal = self.on_raise(err.clone()).await?;
      if terminal && core.result.reject(err).is_err() {
        warn!(observer = core.name, "observer result was already settled during raise");
      }
      Ok(terminal)
    }
    .boxed_local()
  }

  fn aclose(&self) -> LocalBoxFuture<'_, bool> {
    async move {
      let core = self.core();
      if !core.begin_close() {
        return false;
      }
      debug!(observer = core.name, "close");
      self.on_close().await;
      core.result.cancel();
      true
    }
    .boxed_local()
  }

  fn is_closed(&self) -> bool { self.core().is_closed() }

  fn name(&self) -> &'static str { self.core().name() }

  fn scheduler(&self) -> &Scheduler { self.core().scheduler() }
}

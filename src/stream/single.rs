use std::{
  cell::Cell,
  rc::{Rc, Weak},
};

use futures::{future::LocalBoxFuture, FutureExt};
use tracing::debug;

use super::{
  close_late_subscriber,
  subscribers::{Detach, SharedSubscribers},
};
use crate::{
  disposable::Subscription,
  error::{Error, Result},
  observable::Observable,
  observer::{ObserverCore, ObserverHooks, ObserverRef},
  promise::Promise,
  scheduler::Scheduler,
};

/// Stream relaying to at most one observer, ever.
///
/// A second subscription fails with [`Error::SingleStream`], also after the
/// first one was disposed. Values sent with nobody attached are dropped.
pub struct SingleStream<K> {
  core: ObserverCore<()>,
  downstream: SharedSubscribers<K>,
  subscribed: Cell<bool>,
}

impl<K: 'static> SingleStream<K> {
  pub fn new(scheduler: &Scheduler) -> Rc<Self> {
    Rc::new_cyclic(|this: &Weak<Self>| SingleStream {
      core: ObserverCore::new::<K>("SingleStream", scheduler, this.clone()),
      downstream: SharedSubscribers::default(),
      subscribed: Cell::new(false),
    })
  }

  /// Resolves once the stream is closed.
  pub fn result(&self) -> Promise<()> { self.core.result() }

  pub fn has_subscriber(&self) -> bool { self.downstream.borrow().len() > 0 }

  fn target(&self) -> Option<ObserverRef<K>> { self.downstream.borrow().first() }
}

impl<K: 'static> ObserverHooks<K> for SingleStream<K> {
  type Output = ();

  fn core(&self) -> &ObserverCore<()> { &self.core }

  fn on_send(&self, value: K) -> LocalBoxFuture<'_, Result<()>> {
    async move {
      match self.target() {
        Some(observer) => observer.asend(value).await,
        None => {
          debug!(observer = self.core.name(), "no subscriber, value dropped");
          Ok(())
        }
      }
    }
    .boxed_local()
  }

  fn on_raise(&self, err: Error) -> LocalBoxFuture<'_, Result<bool>> {
    async move {
      match self.target() {
        Some(observer) => observer.araise(err).await,
        None => Ok(true),
      }
    }
    .boxed_local()
  }

  fn on_close(&self) -> LocalBoxFuture<'_, ()> {
    async move {
      let detached = self.downstream.borrow_mut().take_all();
      for observer in detached {
        observer.aclose().await;
      }
      let _ = self.core.result().resolve(());
    }
    .boxed_local()
  }
}

impl<K: 'static> Observable<K> for SingleStream<K> {
  fn actual_observe(&self, observer: ObserverRef<K>) -> Result<Subscription> {
    if self.subscribed.replace(true) {
      return Err(Error::SingleStream);
    }
    if self.core.is_closed() {
      return close_late_subscriber(observer);
    }
    let id = self.downstream.borrow_mut().add(observer);
    Ok(Box::new(Detach::new(&self.downstream, id)))
  }
}

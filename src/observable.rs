//! Observable capability, the `observe` entry point and the sources.
//!
//! An [`Observable`] decides how an observer is wired in and returns the
//! [`Subscription`] that undoes it. [`observe`] is the only way in; it
//! refuses closed observers before the observable sees them.
//!
//! ```rust
//! use std::{cell::RefCell, rc::Rc};
//!
//! use aiorx::prelude::*;
//! use futures::executor::LocalPool;
//!
//! let mut pool = LocalPool::new();
//! let scheduler = Scheduler::from(pool.spawner());
//!
//! let seen = Rc::new(RefCell::new(vec![]));
//! let sink = seen.clone();
//! let observer = AnonymousObserver::new(&scheduler, move |v| {
//!   sink.borrow_mut().push(v);
//!   Ok(())
//! });
//!
//! let _subscription = observable::from_iter(0..6)
//!   .filter(|v| v % 2 == 0)
//!   .subscribe(observer.clone())
//!   .unwrap();
//!
//! pool.run_until(observer.result()).unwrap();
//! assert_eq!(*seen.borrow(), vec![0, 2, 4]);
//! ```

use std::{future::Future, rc::Rc};

use tracing::{debug, error};

use crate::{
  disposable::Subscription,
  error::{Error, Result},
  observer::{consume, Observer, ObserverRef},
  ops::{Concat, Filter},
  scheduler::Scheduler,
};

mod from_iter;
mod unit;

pub use from_iter::{from_iter, FromIter};
pub use unit::{from_promise, unit, FromPromise};

/// Producer side of a subscription.
pub trait Observable<K> {
  /// Wire `observer` into this observable.
  ///
  /// Called through [`observe`], which has already checked that the
  /// observer is open.
  fn actual_observe(&self, observer: ObserverRef<K>) -> Result<Subscription>;
}

/// Type-erased observable shared between operators.
pub type ObservableRef<K> = Rc<dyn Observable<K>>;

impl<K, T: Observable<K> + ?Sized> Observable<K> for Rc<T> {
  fn actual_observe(&self, observer: ObserverRef<K>) -> Result<Subscription> {
    (**self).actual_observe(observer)
  }
}

/// Subscribe `observer` to `observable`.
///
/// Fails with [`Error::ObserverClosed`] without touching the observable if
/// the observer is already closed.
pub fn observe<K, O>(observable: &O, observer: ObserverRef<K>) -> Result<Subscription>
where
  O: Observable<K> + ?Sized,
{
  if observer.is_closed() {
    return Err(Error::ObserverClosed(observer.name()));
  }
  observable.actual_observe(observer)
}

// Hand a source's failure to its observer. A closed observer only stops the
// source; a raise that fails for any other reason is logged.
pub(crate) async fn raise_from_source<K>(source: &'static str, observer: &dyn Observer<K>, err: Error) {
  if let Error::ObserverClosed(_) = err {
    debug!(source, "observer closed, source stops");
    return;
  }
  match observer.araise(err).await {
    Ok(_) => {}
    Err(Error::ObserverClosed(_)) => debug!(source, "observer closed before the failure was raised"),
    Err(err) => error!(source, error = %err, "source could not deliver its failure"),
  }
}

/// Combinators available on every observable.
pub trait ObservableExt<K: 'static>: Observable<K> + Sized + 'static {
  fn subscribe(&self, observer: ObserverRef<K>) -> Result<Subscription> { observe(self, observer) }

  /// Apply an operator function, `source.pipe(op)` being `op(source)`.
  fn pipe<R, F: FnOnce(Self) -> R>(self, op: F) -> R { op(self) }

  /// Emit this observable's values followed by `other`'s into one observer.
  fn concat<O: Observable<K> + 'static>(self, other: O) -> Concat<K> {
    Concat::new([Rc::new(self) as ObservableRef<K>, Rc::new(other) as ObservableRef<K>])
  }

  fn filter<F>(self, predicate: F) -> Filter<K, Self>
  where
    F: Fn(&K) -> bool + 'static,
  {
    Filter::new(predicate, self)
  }

  /// Filter with a predicate that can fail; failures are raised downstream.
  fn try_filter<F>(self, predicate: F) -> Filter<K, Self>
  where
    F: Fn(&K) -> Result<bool> + 'static,
  {
    Filter::try_new(predicate, self)
  }

  fn filter_async<F, Fut>(self, predicate: F) -> Filter<K, Self>
  where
    K: Clone,
    F: Fn(K) -> Fut + 'static,
    Fut: Future<Output = Result<bool>> + 'static,
  {
    Filter::new_async(predicate, self)
  }

  /// Wait for the first value, see [`consume`].
  fn consume<'a>(&'a self, scheduler: &'a Scheduler) -> impl Future<Output = Result<K>> + 'a
  where
    K: Clone,
  {
    consume(self, scheduler)
  }
}

impl<K: 'static, O: Observable<K> + 'static> ObservableExt<K> for O {}

use std::iter::{self, Once};

use crate::{
  disposable::{Subscription, TaskDisposable},
  error::{Error, Result},
  observable::{from_iter, raise_from_source, FromIter, Observable},
  observer::ObserverRef,
  promise::Promise,
};

/// Single-value source: sends `value` then closes.
pub fn unit<K: Clone>(value: K) -> FromIter<Once<K>> { from_iter(iter::once(value)) }

/// Source that waits on `promise`.
///
/// A resolved promise sends its value and closes, a rejection is raised, a
/// cancellation just closes. Every subscription waits on the same promise.
pub fn from_promise<K>(promise: Promise<K>) -> FromPromise<K> { FromPromise(promise) }

#[derive(Clone)]
pub struct FromPromise<K>(Promise<K>);

impl<K: Clone + 'static> Observable<K> for FromPromise<K> {
  fn actual_observe(&self, observer: ObserverRef<K>) -> Result<Subscription> {
    let promise = self.0.clone();
    let handle = observer.scheduler().clone().spawn_abortable(async move {
      let failure = match promise.await {
        Ok(value) => observer.asend(value).await.err(),
        Err(Error::Cancelled) => None,
        Err(err) => Some(err),
      };
      match failure {
        None => {
          observer.aclose().await;
        }
        Some(err) => raise_from_source("from_promise", &*observer, err).await,
      }
    })?;
    Ok(Box::new(TaskDisposable::new(handle)))
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use super::*;
  use crate::{
    observable::ObservableExt,
    observer::{AnonymousObserver, Observer},
    scheduler::Scheduler,
  };

  #[aiorx_macro::test]
  async fn consuming_unit_yields_value(scheduler: Scheduler) {
    assert_eq!(unit(42).consume(&scheduler).await.unwrap(), 42);
  }

  #[aiorx_macro::test]
  async fn resolved_promise_sends_then_closes(scheduler: Scheduler) {
    let promise = Promise::<&'static str>::new(&scheduler);
    let seen = Rc::new(RefCell::new(vec![]));
    let sink = seen.clone();
    let observer = AnonymousObserver::new(&scheduler, move |v| {
      sink.borrow_mut().push(v);
      Ok(())
    });
    let _subscription = from_promise(promise.clone()).subscribe(observer.clone()).unwrap();
    assert!(!observer.is_closed());
    promise.resolve("ready").unwrap();
    observer.result().await.unwrap();
    assert_eq!(*seen.borrow(), vec!["ready"]);
  }

  #[aiorx_macro::test]
  async fn rejected_promise_is_raised(scheduler: Scheduler) {
    let promise = Promise::<i32>::rejected(&scheduler, Error::SingleStream);
    assert!(matches!(from_promise(promise).consume(&scheduler).await, Err(Error::SingleStream)));
  }

  #[aiorx_macro::test]
  async fn cancelled_promise_just_closes(scheduler: Scheduler) {
    let promise = Promise::<i32>::new(&scheduler);
    promise.cancel();
    let observer = AnonymousObserver::new(&scheduler, |_: i32| Ok(()));
    let _subscription = from_promise(promise).subscribe(observer.clone()).unwrap();
    assert!(observer.result().await.is_ok());
  }
}

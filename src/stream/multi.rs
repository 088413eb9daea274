use std::rc::{Rc, Weak};

use futures::{
  future::{join_all, LocalBoxFuture},
  FutureExt,
};
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

/// Stream fanning every emission out to all current subscribers.
///
/// Deliveries to the subscribers of one emission run concurrently. Failures
/// are collected and reported together as [`Error::MultiStream`] once every
/// delivery has finished. A raise is terminal only when every subscriber
/// treats it as terminal.
pub struct MultiStream<K> {
  core: ObserverCore<()>,
  subscribers: SharedSubscribers<K>,
}

impl<K: Clone + 'static> MultiStream<K> {
  pub fn new(scheduler: &Scheduler) -> Rc<Self> {
    Rc::new_cyclic(|this: &Weak<Self>| MultiStream {
      core: ObserverCore::new::<K>("MultiStream", scheduler, this.clone()),
      subscribers: SharedSubscribers::default(),
    })
  }

  /// Resolves once the stream is closed.
  pub fn result(&self) -> Promise<()> { self.core.result() }

  pub fn subscriber_count(&self) -> usize { self.subscribers.borrow().len() }
}

fn collect_failures<T>(outcomes: Vec<Result<T>>) -> Result<Vec<T>> {
  let mut values = Vec::with_capacity(outcomes.len());
  let mut failures = vec![];
  for outcome in outcomes {
    match outcome {
      Ok(value) => values.push(value),
      Err(err) => failures.push(err),
    }
  }
  if failures.is_empty() { Ok(values) } else { Err(Error::MultiStream(failures)) }
}

impl<K: Clone + 'static> ObserverHooks<K> for MultiStream<K> {
  type Output = ();

  fn core(&self) -> &ObserverCore<()> { &self.core }

  fn on_send(&self, value: K) -> LocalBoxFuture<'_, Result<()>> {
    async move {
      let targets = self.subscribers.borrow().snapshot();
      if targets.is_empty() {
        debug!(observer = self.core.name(), "no subscribers, value dropped");
        return Ok(());
      }
      let outcomes = join_all(targets.iter().map(|observer| observer.asend(value.clone()))).await;
      collect_failures(outcomes).map(|_| ())
    }
    .boxed_local()
  }

  fn on_raise(&self, err: Error) -> LocalBoxFuture<'_, Result<bool>> {
    async move {
      let targets = self.subscribers.borrow().snapshot();
      let outcomes = join_all(targets.iter().map(|observer| observer.araise(err.clone()))).await;
      let verdicts = collect_failures(outcomes)?;
      Ok(verdicts.into_iter().all(|terminal| terminal))
    }
    .boxed_local()
  }

  fn on_close(&self) -> LocalBoxFuture<'_, ()> {
    async move {
      let detached = self.subscribers.borrow_mut().take_all();
      join_all(detached.iter().map(|observer| observer.aclose())).await;
      let _ = self.core.result().resolve(());
    }
    .boxed_local()
  }
}

impl<K: Clone + 'static> Observable<K> for MultiStream<K> {
  fn actual_observe(&self, observer: ObserverRef<K>) -> Result<Subscription> {
    if self.core.is_closed() {
      return close_late_subscriber(observer);
    }
    let id = self.subscribers.borrow_mut().add(observer);
    Ok(Box::new(Detach::new(&self.subscribers, id)))
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;
  use crate::{
    disposable::Disposable,
    observable::ObservableExt,
    observer::{AnonymousObserver, Observer},
  };

  type Log = Rc<RefCell<Vec<(&'static str, i32)>>>;

  fn tagged(scheduler: &Scheduler, tag: &'static str, log: &Log) -> Rc<AnonymousObserver<i32>> {
    let log = log.clone();
    AnonymousObserver::new(scheduler, move |v| {
      log.borrow_mut().push((tag, v));
      Ok(())
    })
  }

  #[aiorx_macro::test]
  async fn fans_out_to_every_subscriber(scheduler: Scheduler) {
    let stream = MultiStream::<i32>::new(&scheduler);
    let log = Log::default();
    let a = tagged(&scheduler, "a", &log);
    let b = tagged(&scheduler, "b", &log);
    let _sa = stream.subscribe(a.clone()).unwrap();
    let sb = stream.subscribe(b.clone()).unwrap();
    assert_eq!(stream.subscriber_count(), 2);

    stream.asend(1).await.unwrap();
    sb.dispose().await.unwrap();
    assert_eq!(stream.subscriber_count(), 1);
    stream.asend(2).await.unwrap();

    assert!(stream.aclose().await);
    assert_eq!(*log.borrow(), vec![("a", 1), ("b", 1), ("a", 2)]);
    assert!(a.is_closed());
    assert!(!b.is_closed());
  }

  #[aiorx_macro::test]
  async fn delivery_failures_are_aggregated(scheduler: Scheduler) {
    let stream = MultiStream::<i32>::new(&scheduler);
    let log = Log::default();
    let good = tagged(&scheduler, "good", &log);
    let bad = AnonymousObserver::new(&scheduler, |_: i32| Err(Error::InvalidState));
    let worse = AnonymousObserver::new(&scheduler, |_: i32| Err(Error::SingleStream));
    let _s1 = stream.subscribe(bad).unwrap();
    let _s2 = stream.subscribe(good).unwrap();
    let _s3 = stream.subscribe(worse).unwrap();

    match stream.asend(5).await {
      Err(Error::MultiStream(failures)) => {
        assert_eq!(failures.len(), 2);
        assert!(matches!(failures[0], Error::InvalidState));
        assert!(matches!(failures[1], Error::SingleStream));
      }
      other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(*log.borrow(), vec![("good", 5)]);
  }

  #[aiorx_macro::test]
  async fn raise_reaches_all_subscribers(scheduler: Scheduler) {
    let stream = MultiStream::<i32>::new(&scheduler);
    let log = Log::default();
    let a = tagged(&scheduler, "a", &log);
    let b = tagged(&scheduler, "b", &log);
    let _sa = stream.subscribe(a.clone()).unwrap();
    let _sb = stream.subscribe(b.clone()).unwrap();

    assert!(stream.araise(Error::InvalidState).await.unwrap());
    assert!(a.result().await.is_err());
    assert!(b.result().await.is_err());
  }
}

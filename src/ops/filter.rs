use std::{
  future::Future,
  rc::{Rc, Weak},
};

use futures::{future::LocalBoxFuture, FutureExt};

use super::dispose_in_background;
use crate::{
  disposable::{CompositeDisposable, Subscription},
  error::{Error, Result},
  observable::{observe, Observable},
  observer::{Observer, ObserverCore, ObserverHooks, ObserverRef},
  scheduler::Scheduler,
  stream::SingleStream,
};

type SyncPredicate<K> = Box<dyn Fn(&K) -> Result<bool>>;
type AsyncPredicate<K> = Box<dyn Fn(&K) -> LocalBoxFuture<'static, Result<bool>>>;

enum Predicate<K> {
  Sync(SyncPredicate<K>),
  Async(AsyncPredicate<K>),
}

/// Emit only the values of `source` that pass a predicate.
///
/// A predicate that fails raises its error on the internal sink, which
/// hands it on to the observer.
///
/// ```
/// use std::{cell::RefCell, rc::Rc};
///
/// use aiorx::prelude::*;
/// use futures::executor::LocalPool;
///
/// let mut pool = LocalPool::new();
/// let scheduler = Scheduler::from(pool.spawner());
///
/// let coll = Rc::new(RefCell::new(vec![]));
/// let coll_clone = coll.clone();
/// let observer = AnonymousObserver::new(&scheduler, move |v| {
///   coll_clone.borrow_mut().push(v);
///   Ok(())
/// });
///
/// let _subscription = observable::from_iter(0..10)
///   .filter(|v| *v % 2 == 0)
///   .subscribe(observer.clone())
///   .unwrap();
///
/// pool.run_until(observer.result()).unwrap();
/// // only even numbers received.
/// assert_eq!(*coll.borrow(), vec![0, 2, 4, 6, 8]);
/// ```
pub struct Filter<K, S> {
  predicate: Rc<Predicate<K>>,
  source: S,
}

impl<K: 'static, S> Filter<K, S> {
  pub fn new<F>(predicate: F, source: S) -> Self
  where
    F: Fn(&K) -> bool + 'static,
  {
    Self::with_predicate(Predicate::Sync(Box::new(move |v: &K| Ok(predicate(v)))), source)
  }

  pub fn try_new<F>(predicate: F, source: S) -> Self
  where
    F: Fn(&K) -> Result<bool> + 'static,
  {
    Self::with_predicate(Predicate::Sync(Box::new(predicate)), source)
  }

  /// Filter with a predicate that suspends. It is handed a clone of each
  /// value.
  pub fn new_async<F, Fut>(predicate: F, source: S) -> Self
  where
    K: Clone,
    F: Fn(K) -> Fut + 'static,
    Fut: Future<Output = Result<bool>> + 'static,
  {
    let predicate = Predicate::Async(Box::new(move |v: &K| predicate(v.clone()).boxed_local()));
    Self::with_predicate(predicate, source)
  }

  fn with_predicate(predicate: Predicate<K>, source: S) -> Self {
    Filter { predicate: Rc::new(predicate), source }
  }
}

/// Function form of [`Filter::new`].
pub fn filter<K, S, F>(predicate: F, source: S) -> Filter<K, S>
where
  K: 'static,
  F: Fn(&K) -> bool + 'static,
{
  Filter::new(predicate, source)
}

/// Partial form of [`filter`] for [`pipe`](crate::observable::ObservableExt::pipe).
pub fn filter_op<K, S, F>(predicate: F) -> impl FnOnce(S) -> Filter<K, S>
where
  K: 'static,
  F: Fn(&K) -> bool + 'static,
{
  move |source| Filter::new(predicate, source)
}

impl<K: 'static, S: Observable<K>> Observable<K> for Filter<K, S> {
  fn actual_observe(&self, observer: ObserverRef<K>) -> Result<Subscription> {
    let scheduler = observer.scheduler().clone();
    let sink = FilterSink::new(&scheduler, self.predicate.clone());
    let down = observe(&*sink, observer)?;
    let up = match observe(&self.source, sink.clone()) {
      Ok(up) => up,
      Err(err) => {
        let sink: Subscription = Box::new(sink as ObserverRef<K>);
        dispose_in_background(&scheduler, CompositeDisposable::new([down, sink]));
        return Err(err);
      }
    };
    let sink: Subscription = Box::new(sink as ObserverRef<K>);
    Ok(Box::new(CompositeDisposable::new([up, down, sink])))
  }
}

struct FilterSink<K> {
  core: ObserverCore<()>,
  predicate: Rc<Predicate<K>>,
  out: Rc<SingleStream<K>>,
}

impl<K: 'static> FilterSink<K> {
  fn new(scheduler: &Scheduler, predicate: Rc<Predicate<K>>) -> Rc<Self> {
    Rc::new_cyclic(|this: &Weak<Self>| FilterSink {
      core: ObserverCore::new::<K>("Filter", scheduler, this.clone()),
      predicate,
      out: SingleStream::new(scheduler),
    })
  }
}

impl<K: 'static> ObserverHooks<K> for FilterSink<K> {
  type Output = ();

  fn core(&self) -> &ObserverCore<()> { &self.core }

  fn on_send(&self, value: K) -> LocalBoxFuture<'_, Result<()>> {
    async move {
      let accepted = match &*self.predicate {
        Predicate::Sync(predicate) => predicate(&value),
        Predicate::Async(predicate) => predicate(&value).await,
      };
      match accepted {
        Ok(true) => self.out.asend(value).await,
        Ok(false) => Ok(()),
        Err(err) => self.araise(err).await.map(|_| ()),
      }
    }
    .boxed_local()
  }

  fn on_raise(&self, err: Error) -> LocalBoxFuture<'_, Result<bool>> { self.out.araise(err) }

  fn on_close(&self) -> LocalBoxFuture<'_, ()> {
    async move {
      self.out.aclose().await;
      let _ = self.core.result().resolve(());
    }
    .boxed_local()
  }
}

impl<K: 'static> Observable<K> for FilterSink<K> {
  fn actual_observe(&self, observer: ObserverRef<K>) -> Result<Subscription> {
    self.out.actual_observe(observer)
  }
}

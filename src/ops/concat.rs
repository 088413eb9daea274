use std::{
  cell::{Cell, RefCell},
  ops::Add,
  rc::{Rc, Weak},
};

use futures::{
  future::{self, join_all, LocalBoxFuture},
  FutureExt,
};
use tracing::debug;

use super::dispose_in_background;
use crate::{
  disposable::{CompositeDisposable, Subscription},
  error::{Error, Result},
  observable::{observe, Observable, ObservableRef},
  observer::{Observer, ObserverCore, ObserverHooks, ObserverRef},
  stream::SingleStream,
};

/// Emits the values of every source, one source after the other, into one
/// observer.
///
/// Each subscription builds one [`SingleStream`] sink. Every source is
/// subscribed into the sink through its own lane and the sink into the
/// observer. Only the earliest source still open forwards directly; a later
/// source's values are held by its lane until every source before it has
/// closed, then handed to the sink in the order they came. The observer is
/// closed once every source has closed.
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
/// let seen = Rc::new(RefCell::new(vec![]));
/// let sink = seen.clone();
/// let observer = AnonymousObserver::new(&scheduler, move |v| {
///   sink.borrow_mut().push(v);
///   Ok(())
/// });
///
/// let source = observable::from_iter([1, 2]).concat(observable::unit(3));
/// let _subscription = source.subscribe(observer.clone()).unwrap();
///
/// pool.run_until(observer.result()).unwrap();
/// assert_eq!(*seen.borrow(), vec![1, 2, 3]);
/// ```
pub struct Concat<K> {
  sources: Vec<ObservableRef<K>>,
}

impl<K: 'static> Concat<K> {
  pub fn new<I>(sources: I) -> Self
  where
    I: IntoIterator<Item = ObservableRef<K>>,
  {
    Concat { sources: sources.into_iter().collect() }
  }

  /// Append one more source.
  pub fn push<O: Observable<K> + 'static>(mut self, source: O) -> Self {
    self.sources.push(Rc::new(source));
    self
  }

  pub fn len(&self) -> usize { self.sources.len() }

  pub fn is_empty(&self) -> bool { self.sources.is_empty() }

  fn wire(
    &self, order: &Rc<Turns<K>>, observer: ObserverRef<K>, made: &mut Vec<Subscription>,
  ) -> Result<()> {
    for index in 0..self.sources.len() {
      let lane = Lane::new(order, index);
      made.push(observe(&self.sources[index], lane)?);
    }
    made.push(observe(&*order.sink, observer)?);
    Ok(())
  }
}

/// Concatenate `sources`.
pub fn concat<K: 'static, I>(sources: I) -> Concat<K>
where
  I: IntoIterator<Item = ObservableRef<K>>,
{
  Concat::new(sources)
}

/// Partial form of [`concat`] for [`pipe`](crate::observable::ObservableExt::pipe):
/// `source.pipe(concat_op(first))` emits `first`, then `source`.
pub fn concat_op<K, F, S>(first: F) -> impl FnOnce(S) -> Concat<K>
where
  K: 'static,
  F: Observable<K> + 'static,
  S: Observable<K> + 'static,
{
  move |source| Concat::new([Rc::new(first) as ObservableRef<K>, Rc::new(source) as ObservableRef<K>])
}

impl<K: 'static> Observable<K> for Concat<K> {
  fn actual_observe(&self, observer: ObserverRef<K>) -> Result<Subscription> {
    let scheduler = observer.scheduler().clone();
    let order = Turns::new(SingleStream::new(&scheduler), self.sources.len());
    let mut made = Vec::with_capacity(self.sources.len() + 2);

    let mut wired = self.wire(&order, observer, &mut made);
    if wired.is_ok() && self.sources.is_empty() {
      let order = order.clone();
      wired = scheduler.spawn(async move { order.advance().await });
    }
    if let Err(err) = wired {
      debug!(error = %err, "concat setup failed, disposing partial subscription");
      made.push(Box::new(order.sink.clone() as ObserverRef<K>));
      dispose_in_background(&scheduler, CompositeDisposable::new(made));
      return Err(err);
    }
    made.push(Box::new(order.sink.clone() as ObserverRef<K>));
    Ok(Box::new(CompositeDisposable::new(made)))
  }
}

impl<K: 'static, O: Observable<K> + 'static> Add<O> for Concat<K> {
  type Output = Concat<K>;

  fn add(self, source: O) -> Concat<K> { self.push(source) }
}

struct Slot<K> {
  active: Cell<bool>,
  closed: Cell<bool>,
  held: RefCell<Vec<K>>,
}

/// Which source's turn it is, shared by every lane of one subscription.
struct Turns<K> {
  sink: Rc<SingleStream<K>>,
  slots: Vec<Slot<K>>,
  current: Cell<usize>,
  advancing: Cell<bool>,
}

impl<K: 'static> Turns<K> {
  fn new(sink: Rc<SingleStream<K>>, lanes: usize) -> Rc<Self> {
    let slots = (0..lanes)
      .map(|index| Slot {
        active: Cell::new(index == 0),
        closed: Cell::new(false),
        held: RefCell::default(),
      })
      .collect();
    Rc::new(Turns { sink, slots, current: Cell::new(0), advancing: Cell::new(false) })
  }

  // Hand the turn on past every closed lane, flushing what each held, and
  // close the sink after the last one. Only one call walks at a time; the
  // others leave it to the walk in progress.
  async fn advance(&self) {
    if self.advancing.replace(true) {
      return;
    }
    loop {
      let current = self.current.get();
      let Some(slot) = self.slots.get(current) else {
        self.advancing.set(false);
        self.sink.aclose().await;
        return;
      };
      // Tickets are taken here, in order, before any later send can queue.
      let flushing: Vec<_> = slot.held.take().into_iter().map(|v| self.sink.asend(v)).collect();
      slot.active.set(true);
      for outcome in join_all(flushing).await {
        if let Err(err) = outcome {
          debug!(error = %err, "held concat value not delivered");
        }
      }
      if !slot.closed.get() {
        self.advancing.set(false);
        return;
      }
      self.current.set(current + 1);
    }
  }
}

/// Observer standing between one source and the shared sink.
///
/// Forwards while its source has the turn and holds values otherwise.
/// Errors always go straight through.
struct Lane<K> {
  core: ObserverCore<()>,
  order: Rc<Turns<K>>,
  index: usize,
}

impl<K: 'static> Lane<K> {
  fn new(order: &Rc<Turns<K>>, index: usize) -> Rc<Self> {
    let scheduler = order.sink.scheduler().clone();
    Rc::new_cyclic(|this: &Weak<Self>| Lane {
      core: ObserverCore::new::<K>("Concat", &scheduler, this.clone()),
      order: order.clone(),
      index,
    })
  }

  fn slot(&self) -> &Slot<K> { &self.order.slots[self.index] }
}

impl<K: 'static> ObserverHooks<K> for Lane<K> {
  type Output = ();

  fn core(&self) -> &ObserverCore<()> { &self.core }

  fn on_send(&self, value: K) -> LocalBoxFuture<'_, Result<()>> {
    let slot = self.slot();
    if slot.active.get() {
      return self.order.sink.asend(value);
    }
    slot.held.borrow_mut().push(value);
    future::ok(()).boxed_local()
  }

  fn on_raise(&self, err: Error) -> LocalBoxFuture<'_, Result<bool>> { self.order.sink.araise(err) }

  fn on_close(&self) -> LocalBoxFuture<'_, ()> {
    async move {
      self.slot().closed.set(true);
      let _ = self.core.result().resolve(());
      self.order.advance().await;
    }
    .boxed_local()
  }
}

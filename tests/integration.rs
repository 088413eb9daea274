//! Integration tests for aiorx
//!
//! Operator chains, streams and custom observers driven end to end through
//! the public API.

use std::{
  cell::{Cell, RefCell},
  io,
  rc::{Rc, Weak},
  sync::{Arc, Mutex},
  task::Poll,
};

use aiorx::prelude::*;
use futures::{
  executor::LocalPool,
  future::{self, join_all, LocalBoxFuture},
  FutureExt,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

/// Log output gathered by a scoped subscriber.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
  fn text(&self) -> String { String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned() }
}

impl io::Write for Captured {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

fn with_captured_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
  let captured = Captured::default();
  let writer = captured.clone();
  let subscriber = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::new("aiorx=trace"))
    .with_ansi(false)
    .with_writer(move || writer.clone())
    .finish();
  let outcome = tracing::subscriber::with_default(subscriber, f);
  (outcome, captured.text())
}

async fn yield_now() {
  let mut yielded = false;
  future::poll_fn(|cx| {
    if yielded {
      Poll::Ready(())
    } else {
      yielded = true;
      cx.waker().wake_by_ref();
      Poll::Pending
    }
  })
  .await
}

/// Collects every value and resolves with all of them on close.
struct Collector {
  core: ObserverCore<Vec<i32>>,
  items: RefCell<Vec<i32>>,
}

impl Collector {
  fn new(scheduler: &Scheduler) -> Rc<Self> {
    Rc::new_cyclic(|this: &Weak<Self>| Collector {
      core: ObserverCore::new::<i32>("Collector", scheduler, this.clone()),
      items: RefCell::default(),
    })
  }

  fn result(&self) -> Promise<Vec<i32>> { self.core.result() }
}

impl ObserverHooks<i32> for Collector {
  type Output = Vec<i32>;

  fn core(&self) -> &ObserverCore<Vec<i32>> { &self.core }

  fn on_send(&self, value: i32) -> LocalBoxFuture<'_, Result<()>> {
    self.items.borrow_mut().push(value);
    future::ok(()).boxed_local()
  }

  fn on_raise(&self, _: Error) -> LocalBoxFuture<'_, Result<bool>> { future::ok(true).boxed_local() }

  fn on_close(&self) -> LocalBoxFuture<'_, ()> {
    let _ = self.core.result().resolve(self.items.take());
    future::ready(()).boxed_local()
  }
}

#[derive(Debug, thiserror::Error)]
#[error("bad value {0}")]
struct BadValue(i32);

#[aiorx_macro::test]
async fn concat_delivers_sources_in_order_then_closes(scheduler: Scheduler) {
  init_tracing();
  let collector = Collector::new(&scheduler);
  let source = concat([
    Rc::new(observable::from_iter(vec![1, 2])) as ObservableRef<i32>,
    Rc::new(observable::unit(3)),
  ]);
  let _subscription = source.subscribe(collector.clone()).unwrap();

  assert_eq!(collector.result().await.unwrap(), vec![1, 2, 3]);
  assert!(collector.is_closed());
}

#[aiorx_macro::test]
async fn filter_keeps_even_values(scheduler: Scheduler) {
  init_tracing();
  let collector = Collector::new(&scheduler);
  let _subscription =
    filter(|v: &i32| v % 2 == 0, observable::from_iter([1, 2, 3, 4])).subscribe(collector.clone()).unwrap();
  assert_eq!(collector.result().await.unwrap(), vec![2, 4]);
}

#[aiorx_macro::test]
async fn filter_raises_predicate_failure(scheduler: Scheduler) {
  init_tracing();
  let seen = Rc::new(RefCell::new(vec![]));
  let sink = seen.clone();
  let observer = AnonymousObserver::new(&scheduler, move |v| {
    sink.borrow_mut().push(v);
    Ok(())
  });
  let source = observable::from_iter([1, 2, 3, 4])
    .try_filter(|v| if *v == 3 { Err(Error::custom(BadValue(*v))) } else { Ok(true) });
  let _subscription = source.subscribe(observer.clone()).unwrap();

  let err = observer.result().await.unwrap_err();
  assert!(err.as_custom().is_some());
  assert_eq!(err.to_string(), "bad value 3");
  assert_eq!(*seen.borrow(), vec![1, 2]);
}

#[aiorx_macro::test]
async fn chained_operators_compose(scheduler: Scheduler) {
  let collector = Collector::new(&scheduler);
  let source = observable::from_iter(0..5)
    .concat(observable::from_iter(10..15))
    .filter(|v| v % 3 == 0)
    .filter_async(|v| async move {
      yield_now().await;
      Ok(v != 4)
    });
  let _subscription = source.subscribe(collector.clone()).unwrap();
  assert_eq!(collector.result().await.unwrap(), vec![0, 3, 12]);
}

#[aiorx_macro::test]
async fn concat_keeps_order_behind_a_suspending_filter(scheduler: Scheduler) {
  let collector = Collector::new(&scheduler);
  let source = observable::from_iter([1, 2]).concat(observable::unit(3)).filter_async(|_| async {
    yield_now().await;
    yield_now().await;
    Ok(true)
  });
  let _subscription = source.subscribe(collector.clone()).unwrap();
  assert_eq!(collector.result().await.unwrap(), vec![1, 2, 3]);
}

#[aiorx_macro::test]
async fn single_stream_accepts_one_subscriber(scheduler: Scheduler) {
  let stream = SingleStream::<i32>::new(&scheduler);
  let first = Collector::new(&scheduler);
  let second = Collector::new(&scheduler);

  let _subscription = stream.subscribe(first.clone()).unwrap();
  assert!(matches!(stream.subscribe(second.clone()), Err(Error::SingleStream)));
  assert!(!second.is_closed());

  stream.asend(1).await.unwrap();
  stream.aclose().await;
  assert_eq!(first.result().await.unwrap(), vec![1]);
}

#[aiorx_macro::test]
async fn multi_stream_fans_out_through_operators(scheduler: Scheduler) {
  let stream = MultiStream::<i32>::new(&scheduler);
  let all = Collector::new(&scheduler);
  let big = Collector::new(&scheduler);
  let _all = stream.subscribe(all.clone()).unwrap();
  let _big = stream.clone().filter(|v| *v > 1).subscribe(big.clone()).unwrap();
  assert_eq!(stream.subscriber_count(), 2);

  for v in 1..=3 {
    stream.asend(v).await.unwrap();
  }
  stream.aclose().await;

  assert_eq!(all.result().await.unwrap(), vec![1, 2, 3]);
  assert_eq!(big.result().await.unwrap(), vec![2, 3]);
}

#[aiorx_macro::test]
async fn racing_sends_keep_call_order(scheduler: Scheduler) {
  let stream = MultiStream::<i32>::new(&scheduler);
  let collector = Collector::new(&scheduler);
  // Larger values take fewer turns in the predicate.
  let _subscription = stream
    .clone()
    .filter_async(|v| async move {
      for _ in v..5 {
        yield_now().await;
      }
      Ok(true)
    })
    .subscribe(collector.clone())
    .unwrap();

  let sends: Vec<_> = (0..5).map(|v| stream.asend(v)).collect();
  for outcome in join_all(sends).await {
    outcome.unwrap();
  }
  stream.aclose().await;
  assert_eq!(collector.result().await.unwrap(), vec![0, 1, 2, 3, 4]);
}

#[aiorx_macro::test]
async fn concat_setup_failure_cleans_up(scheduler: Scheduler) {
  let taken = SingleStream::<i32>::new(&scheduler);
  let _owner = taken.subscribe(Collector::new(&scheduler)).unwrap();

  let live = MultiStream::<i32>::new(&scheduler);
  let collector = Collector::new(&scheduler);
  let source = concat([live.clone() as ObservableRef<i32>, taken]);
  assert!(matches!(source.subscribe(collector.clone()), Err(Error::SingleStream)));

  assert_eq!(live.subscriber_count(), 1);
  yield_now().await;
  assert_eq!(live.subscriber_count(), 0);
  assert!(!collector.is_closed());
}

#[aiorx_macro::test]
async fn consume_takes_the_first_value(scheduler: Scheduler) {
  assert_eq!(observable::unit("only").consume(&scheduler).await.unwrap(), "only");
  assert_eq!(consume(&observable::from_iter([7, 8]), &scheduler).await.unwrap(), 7);
  assert!(matches!(
    Concat::<i32>::new([]).consume(&scheduler).await,
    Err(Error::Cancelled)
  ));
}

#[aiorx_macro::test]
async fn derived_promise_is_shielded(scheduler: Scheduler) {
  let parent = Promise::<i32>::new(&scheduler);
  let derived = Promise::then(&parent, |v| Ok(v + 1));
  let cleaned = Rc::new(Cell::new(false));
  let flag = cleaned.clone();
  let finished = parent.lastly(move || {
    flag.set(true);
    Ok(())
  });

  assert!(derived.cancel());
  assert!(parent.is_pending());
  parent.resolve(1).unwrap();

  assert_eq!(finished.await.unwrap(), 1);
  assert!(cleaned.get());
  assert!(matches!(derived.await, Err(Error::Cancelled)));
}

#[aiorx_macro::test]
async fn composite_disposal_collects_failures() {
  let disposed = Rc::new(RefCell::new(vec![]));
  let item = |name: &'static str, fails: bool| -> Subscription {
    let disposed = disposed.clone();
    Box::new(AnonymousDisposable::new(move || {
      async move {
        disposed.borrow_mut().push(name);
        if fails { Err(Error::custom(BadValue(0))) } else { Ok(()) }
      }
      .boxed_local()
    }))
  };
  let composite = CompositeDisposable::new([item("first", false), item("second", true), item("third", false)]);

  match composite.dispose().await {
    Err(Error::Dispose(failures)) => assert_eq!(failures.len(), 1),
    other => panic!("unexpected outcome {other:?}"),
  }
  assert_eq!(*disposed.borrow(), vec!["first", "second", "third"]);
  assert!(composite.dispose().await.is_ok());
}

/// Refuses every value and fails to take any error.
struct Refusing {
  core: ObserverCore<()>,
}

impl Refusing {
  fn new(scheduler: &Scheduler) -> Rc<Self> {
    Rc::new_cyclic(|this: &Weak<Self>| Refusing {
      core: ObserverCore::new::<i32>("Refusing", scheduler, this.clone()),
    })
  }
}

impl ObserverHooks<i32> for Refusing {
  type Output = ();

  fn core(&self) -> &ObserverCore<()> { &self.core }

  fn on_send(&self, value: i32) -> LocalBoxFuture<'_, Result<()>> {
    future::err(Error::custom(BadValue(value))).boxed_local()
  }

  fn on_raise(&self, _: Error) -> LocalBoxFuture<'_, Result<bool>> {
    future::err(Error::InvalidState).boxed_local()
  }

  fn on_close(&self) -> LocalBoxFuture<'_, ()> { future::ready(()).boxed_local() }
}

#[aiorx_macro::test]
fn undeliverable_source_failure_is_logged_as_error() {
  let (closed, logs) = with_captured_logs(|| {
    let mut pool = LocalPool::new();
    let scheduler = Scheduler::from(pool.spawner());
    let observer = Refusing::new(&scheduler);
    let _subscription = observable::from_iter([5]).subscribe(observer.clone()).unwrap();
    pool.run_until_stalled();
    observer.is_closed()
  });
  assert!(!closed);
  assert!(logs.contains("ERROR"), "{logs}");
  assert!(logs.contains("source could not deliver its failure"), "{logs}");
  assert!(logs.contains("from_iter"), "{logs}");
}

#[aiorx_macro::test]
fn warn_policy_logs_disposal_failures() {
  let (outcome, logs) = with_captured_logs(|| {
    let failing: Subscription =
      Box::new(AnonymousDisposable::new(|| future::err(Error::custom(BadValue(1))).boxed_local()));
    let composite = CompositeDisposable::new([failing]).with_policy(DisposePolicy::Warn);
    futures::executor::block_on(composite.dispose())
  });
  assert!(outcome.is_ok());
  assert!(logs.contains("WARN"), "{logs}");
  assert!(logs.contains("composite disposal failed"), "{logs}");
}

#[aiorx_macro::test]
fn version_is_exported() {
  assert_eq!(aiorx::VERSION, env!("CARGO_PKG_VERSION"));
}

#[cfg(feature = "tokio-scheduler")]
#[aiorx_macro::test]
fn runs_on_a_tokio_local_set() {
  let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
  let local = tokio::task::LocalSet::new();
  let value = local.block_on(&runtime, async {
    let scheduler = Scheduler::from(aiorx::scheduler::TokioLocal);
    let first = observable::from_iter([1, 2, 3]).filter(|v| *v > 1).consume(&scheduler).await;
    first
  });
  assert_eq!(value.unwrap(), 2);
}

//! Promise: an awaitable, single-assignment result cell.
//!
//! A [`Promise`] starts pending and settles at most once, to a value, an
//! error, or cancellation. Handles are cheap clones of one shared cell and
//! each clone is itself a [`Future`]; awaiting a clone is how continuations
//! wait on their parent without owning it, so dropping or cancelling a
//! waiter never reaches back into the parent.
//!
//! ```rust
//! use aiorx::prelude::*;
//! use futures::executor::LocalPool;
//!
//! let mut pool = LocalPool::new();
//! let scheduler = Scheduler::from(pool.spawner());
//!
//! let answer = Promise::<i32>::new(&scheduler);
//! let doubled = answer.then(|v| Ok(v * 2));
//! answer.resolve(21).unwrap();
//!
//! assert_eq!(pool.run_until(doubled).unwrap(), 42);
//! ```

use std::{
  cell::{Cell, RefCell},
  fmt,
  future::Future,
  pin::Pin,
  rc::Rc,
  task::{Context, Poll, Waker},
};

use futures::future::{self, AbortHandle};
use smallvec::SmallVec;
use tracing::trace;

use crate::{
  error::{Error, Result},
  scheduler::Scheduler,
};

/// Identifies a callback registered with [`Promise::add_done_callback`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackId(usize);

type DoneCallback = Box<dyn FnOnce()>;

enum Settled<K> {
  Resolved(K),
  Rejected(Error),
  Cancelled,
}

#[derive(Default)]
struct Waiters {
  wakers: SmallVec<[Waker; 1]>,
  callbacks: SmallVec<[(CallbackId, DoneCallback); 1]>,
}

impl Waiters {
  fn register(&mut self, waker: &Waker) {
    if !self.wakers.iter().any(|w| w.will_wake(waker)) {
      self.wakers.push(waker.clone());
    }
  }
}

struct Inner<K> {
  outcome: RefCell<Option<Settled<K>>>,
  waiters: RefCell<Waiters>,
  task: RefCell<Option<AbortHandle>>,
  next_callback: Cell<usize>,
  scheduler: Scheduler,
}

pub struct Promise<K> {
  inner: Rc<Inner<K>>,
}

impl<K> Clone for Promise<K> {
  fn clone(&self) -> Self { Promise { inner: self.inner.clone() } }
}

impl<K: 'static> Promise<K> {
  /// A pending promise whose continuations run on `scheduler`.
  pub fn new(scheduler: &Scheduler) -> Self {
    Promise {
      inner: Rc::new(Inner {
        outcome: RefCell::new(None),
        waiters: RefCell::new(Waiters::default()),
        task: RefCell::new(None),
        next_callback: Cell::new(0),
        scheduler: scheduler.clone(),
      }),
    }
  }

  pub fn resolved(scheduler: &Scheduler, value: K) -> Self {
    let promise = Self::new(scheduler);
    *promise.inner.outcome.borrow_mut() = Some(Settled::Resolved(value));
    promise
  }

  pub fn rejected(scheduler: &Scheduler, err: Error) -> Self {
    let promise = Self::new(scheduler);
    *promise.inner.outcome.borrow_mut() = Some(Settled::Rejected(err));
    promise
  }

  /// A promise settled by running `task` on `scheduler`.
  ///
  /// An `Err(Error::Cancelled)` outcome settles the promise as cancelled.
  /// Cancelling the promise aborts the task.
  pub fn spawn<F>(scheduler: &Scheduler, task: F) -> Self
  where
    F: Future<Output = Result<K>> + 'static,
  {
    let promise = Self::new(scheduler);
    let target = promise.clone();
    match scheduler.spawn_abortable(async move {
      let outcome = task.await;
      target.settle_from(outcome);
    }) {
      Ok(handle) => *promise.inner.task.borrow_mut() = Some(handle),
      Err(err) => {
        let _ = promise.reject(err);
      }
    }
    promise
  }

  /// Resolve with `value`. Fails with [`Error::InvalidState`] unless pending.
  pub fn resolve(&self, value: K) -> Result<()> { self.transition(Settled::Resolved(value)) }

  /// Reject with `err`. Fails with [`Error::InvalidState`] unless pending.
  pub fn reject(&self, err: Error) -> Result<()> { self.transition(Settled::Rejected(err)) }

  /// Cancel the promise and the task settling it, if any.
  ///
  /// Returns `false` if the promise had already settled.
  pub fn cancel(&self) -> bool {
    if self.transition(Settled::Cancelled).is_err() {
      return false;
    }
    if let Some(task) = self.inner.task.borrow_mut().take() {
      task.abort();
    }
    true
  }

  /// Register `callback` to run right after the promise settles.
  ///
  /// If the promise is already settled the callback runs immediately.
  pub fn add_done_callback<F: FnOnce() + 'static>(&self, callback: F) -> CallbackId {
    let id = CallbackId(self.inner.next_callback.get());
    self.inner.next_callback.set(id.0 + 1);
    if self.is_done() {
      callback();
    } else {
      self.inner.waiters.borrow_mut().callbacks.push((id, Box::new(callback)));
    }
    id
  }

  /// Returns `true` if the callback was still registered.
  pub fn remove_done_callback(&self, id: CallbackId) -> bool {
    let mut waiters = self.inner.waiters.borrow_mut();
    let before = waiters.callbacks.len();
    waiters.callbacks.retain(|(registered, _)| *registered != id);
    waiters.callbacks.len() != before
  }

  fn settle_from(&self, outcome: Result<K>) {
    let settled = match outcome {
      Ok(value) => Settled::Resolved(value),
      Err(Error::Cancelled) => Settled::Cancelled,
      Err(err) => Settled::Rejected(err),
    };
    if self.transition(settled).is_err() {
      trace!("promise settled before its task finished");
    }
  }

  fn transition(&self, settled: Settled<K>) -> Result<()> {
    {
      let mut outcome = self.inner.outcome.borrow_mut();
      if outcome.is_some() {
        return Err(Error::InvalidState);
      }
      *outcome = Some(settled);
    }
    let waiters = std::mem::take(&mut *self.inner.waiters.borrow_mut());
    for waker in waiters.wakers {
      waker.wake();
    }
    for (_, callback) in waiters.callbacks {
      callback();
    }
    Ok(())
  }
}

impl<K> Promise<K> {
  pub fn is_pending(&self) -> bool { self.inner.outcome.borrow().is_none() }

  pub fn is_done(&self) -> bool { !self.is_pending() }

  pub fn is_cancelled(&self) -> bool { matches!(*self.inner.outcome.borrow(), Some(Settled::Cancelled)) }

  pub fn scheduler(&self) -> &Scheduler { &self.inner.scheduler }
}

impl<K: Clone> Promise<K> {
  /// The outcome, if settled.
  pub fn try_result(&self) -> Option<Result<K>> {
    self.inner.outcome.borrow().as_ref().map(|settled| match settled {
      Settled::Resolved(value) => Ok(value.clone()),
      Settled::Rejected(err) => Err(err.clone()),
      Settled::Cancelled => Err(Error::Cancelled),
    })
  }
}

impl<K: Clone + 'static> Promise<K> {
  /// Chain `on_fulfilled` onto the resolved value.
  ///
  /// Rejections pass through to the derived promise untouched.
  pub fn then<T, F>(&self, on_fulfilled: F) -> Promise<T>
  where
    T: 'static,
    F: FnOnce(K) -> Result<T> + 'static,
  {
    self.then_async(move |value| future::ready(on_fulfilled(value)))
  }

  /// Like [`then`](Self::then), awaiting the future the callback returns.
  pub fn then_async<T, F, Fut>(&self, on_fulfilled: F) -> Promise<T>
  where
    T: 'static,
    F: FnOnce(K) -> Fut + 'static,
    Fut: Future<Output = Result<T>> + 'static,
  {
    let parent = self.clone();
    Promise::spawn(self.scheduler(), async move {
      match parent.await {
        Ok(value) => on_fulfilled(value).await,
        Err(err) => Err(err),
      }
    })
  }

  /// Chain `on_rejected` onto a rejection, recovering a value.
  ///
  /// Values pass through; cancellation is not a rejection and passes through
  /// as cancellation.
  pub fn catch<F>(&self, on_rejected: F) -> Promise<K>
  where
    F: FnOnce(Error) -> Result<K> + 'static,
  {
    self.catch_async(move |err| future::ready(on_rejected(err)))
  }

  pub fn catch_async<F, Fut>(&self, on_rejected: F) -> Promise<K>
  where
    F: FnOnce(Error) -> Fut + 'static,
    Fut: Future<Output = Result<K>> + 'static,
  {
    let parent = self.clone();
    Promise::spawn(self.scheduler(), async move {
      match parent.await {
        Err(err) if !matches!(err, Error::Cancelled) => on_rejected(err).await,
        outcome => outcome,
      }
    })
  }

  /// Run `on_settled` once the parent settles, whatever the outcome.
  ///
  /// The derived promise settles exactly like the parent unless the
  /// callback fails, in which case it is rejected with the callback's error.
  pub fn lastly<F>(&self, on_settled: F) -> Promise<K>
  where
    F: FnOnce() -> Result<()> + 'static,
  {
    self.lastly_async(move || future::ready(on_settled()))
  }

  pub fn lastly_async<F, Fut>(&self, on_settled: F) -> Promise<K>
  where
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
  {
    let parent = self.clone();
    Promise::spawn(self.scheduler(), async move {
      let outcome = parent.await;
      on_settled().await.and(outcome)
    })
  }
}

impl<K: Clone> Future for Promise<K> {
  type Output = Result<K>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    if let Some(outcome) = self.try_result() {
      return Poll::Ready(outcome);
    }
    self.inner.waiters.borrow_mut().register(cx.waker());
    Poll::Pending
  }
}

impl<K> fmt::Debug for Promise<K> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = match &*self.inner.outcome.borrow() {
      None => "pending",
      Some(Settled::Resolved(_)) => "resolved",
      Some(Settled::Rejected(_)) => "rejected",
      Some(Settled::Cancelled) => "cancelled",
    };
    f.debug_struct("Promise").field("state", &state).finish()
  }
}

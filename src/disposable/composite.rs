use std::cell::{Cell, RefCell};

use futures::future::LocalBoxFuture;
use smallvec::SmallVec;
use tracing::warn;

use super::{Disposable, Subscription};
use crate::error::{Error, Result};

/// What a [`CompositeDisposable`] does with failures of its members.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisposePolicy {
  /// Return every failure aggregated in [`Error::Dispose`].
  #[default]
  Raise,
  /// Log the aggregate as a warning and report success.
  Warn,
}

/// Owns an ordered set of disposables and disposes all of them together.
///
/// A failing member never stops the disposal of the members after it.
/// Members added after the composite was disposed are disposed on the next
/// call to [`dispose`](Disposable::dispose).
#[derive(Default)]
pub struct CompositeDisposable {
  items: RefCell<SmallVec<[Subscription; 2]>>,
  policy: DisposePolicy,
  disposed: Cell<bool>,
}

impl CompositeDisposable {
  pub fn new<I>(items: I) -> Self
  where
    I: IntoIterator<Item = Subscription>,
  {
    CompositeDisposable { items: RefCell::new(items.into_iter().collect()), ..Default::default() }
  }

  pub fn with_policy(mut self, policy: DisposePolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn add(&self, item: Subscription) { self.items.borrow_mut().push(item); }

  pub fn len(&self) -> usize { self.items.borrow().len() }

  pub fn is_empty(&self) -> bool { self.items.borrow().is_empty() }
}

impl Disposable for CompositeDisposable {
  fn dispose(&self) -> LocalBoxFuture<'_, Result<()>> {
    self.disposed.set(true);
    let items = std::mem::take(&mut *self.items.borrow_mut());
    Box::pin(async move {
      let mut errors = Vec::new();
      for item in items.iter() {
        if let Err(err) = item.dispose().await {
          errors.push(err);
        }
      }
      if errors.is_empty() {
        return Ok(());
      }
      let err = Error::Dispose(errors);
      match self.policy {
        DisposePolicy::Raise => Err(err),
        DisposePolicy::Warn => {
          warn!(error = %err, "composite disposal failed");
          Ok(())
        }
      }
    })
  }

  fn is_disposed(&self) -> bool { self.disposed.get() && self.items.borrow().is_empty() }
}

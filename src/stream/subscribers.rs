use std::{
  cell::{Cell, RefCell},
  rc::{Rc, Weak},
};

use futures::future::{self, LocalBoxFuture};
use smallvec::SmallVec;

use crate::{disposable::Disposable, error::Result, observer::ObserverRef};

/// Observers attached to a stream, keyed by subscription id.
pub(crate) struct Subscribers<K> {
  next_id: usize,
  items: SmallVec<[(usize, ObserverRef<K>); 2]>,
}

impl<K> Default for Subscribers<K> {
  fn default() -> Self { Subscribers { next_id: 0, items: SmallVec::new() } }
}

impl<K> Subscribers<K> {
  pub(crate) fn add(&mut self, observer: ObserverRef<K>) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    self.items.push((id, observer));
    id
  }

  pub(crate) fn remove(&mut self, id: usize) -> Option<ObserverRef<K>> {
    let index = self.items.iter().position(|(item, _)| *item == id)?;
    Some(self.items.remove(index).1)
  }

  pub(crate) fn len(&self) -> usize { self.items.len() }

  pub(crate) fn first(&self) -> Option<ObserverRef<K>> {
    self.items.first().map(|(_, observer)| observer.clone())
  }

  /// Clones of the current observers, so no borrow is held while emitting.
  pub(crate) fn snapshot(&self) -> SmallVec<[ObserverRef<K>; 2]> {
    self.items.iter().map(|(_, observer)| observer.clone()).collect()
  }

  pub(crate) fn take_all(&mut self) -> SmallVec<[ObserverRef<K>; 2]> {
    self.items.drain(..).map(|(_, observer)| observer).collect()
  }
}

pub(crate) type SharedSubscribers<K> = Rc<RefCell<Subscribers<K>>>;

/// Subscription that removes one observer from a stream.
///
/// Holds the registry weakly so an outstanding subscription does not keep a
/// dropped stream alive.
pub(crate) struct Detach<K> {
  registry: Weak<RefCell<Subscribers<K>>>,
  id: usize,
  disposed: Cell<bool>,
}

impl<K> Detach<K> {
  pub(crate) fn new(registry: &SharedSubscribers<K>, id: usize) -> Self {
    Detach { registry: Rc::downgrade(registry), id, disposed: Cell::new(false) }
  }
}

impl<K> Disposable for Detach<K> {
  fn dispose(&self) -> LocalBoxFuture<'_, Result<()>> {
    if !self.disposed.replace(true) {
      if let Some(registry) = self.registry.upgrade() {
        // Dropped outside the borrow: the observer may be the last owner
        // of something that reaches back into this registry.
        let removed = registry.borrow_mut().remove(self.id);
        drop(removed);
      }
    }
    Box::pin(future::ok(()))
  }

  fn is_disposed(&self) -> bool { self.disposed.get() }
}

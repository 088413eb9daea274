//! Ticket gate that serializes emissions into one observer.
//!
//! Each call takes a ticket from a monotonic counter when it is made. The
//! gate services tickets strictly in order: a ticket is admitted once every
//! earlier ticket has passed through, and the admitted [`Pass`] releases the
//! next ticket when it is dropped. This is a queue discipline rather than a
//! lock; wake-ups re-check the serviced index, so a spurious wake never lets
//! a ticket jump the queue.

use std::{
  cell::RefCell,
  collections::{BTreeMap, BTreeSet},
  future::Future,
  pin::Pin,
  task::{Context, Poll, Waker},
};

#[derive(Default)]
struct State {
  next: u64,
  serving: u64,
  parked: BTreeMap<u64, Waker>,
  // Tickets dropped before admission. They are skipped when reached.
  abandoned: BTreeSet<u64>,
}

impl State {
  fn advance(&mut self) {
    self.serving += 1;
    while self.abandoned.remove(&self.serving) {
      self.serving += 1;
    }
    if let Some(waker) = self.parked.remove(&self.serving) {
      waker.wake();
    }
  }
}

#[derive(Default)]
pub(crate) struct Gate {
  state: RefCell<State>,
}

impl Gate {
  /// Take the next ticket. The place in the queue is fixed by this call,
  /// not by when the returned future is first polled.
  pub(crate) fn ticket(&self) -> Ticket<'_> {
    let mut state = self.state.borrow_mut();
    let number = state.next;
    state.next += 1;
    Ticket { gate: self, number, admitted: false }
  }

  /// Number of tickets issued and not yet released.
  pub(crate) fn queued(&self) -> u64 {
    let state = self.state.borrow();
    state.next - state.serving - state.abandoned.len() as u64
  }
}

#[must_use = "a ticket holds its place in the queue until dropped"]
pub(crate) struct Ticket<'a> {
  gate: &'a Gate,
  number: u64,
  admitted: bool,
}

impl<'a> Future for Ticket<'a> {
  type Output = Pass<'a>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Pass<'a>> {
    let mut state = self.gate.state.borrow_mut();
    if state.serving == self.number {
      state.parked.remove(&self.number);
      drop(state);
      self.admitted = true;
      Poll::Ready(Pass { gate: self.gate })
    } else {
      state.parked.insert(self.number, cx.waker().clone());
      Poll::Pending
    }
  }
}

impl Drop for Ticket<'_> {
  fn drop(&mut self) {
    if self.admitted {
      return;
    }
    let mut state = self.gate.state.borrow_mut();
    state.parked.remove(&self.number);
    if state.serving == self.number {
      // Woken (or first in line) but dropped before running.
      state.advance();
    } else {
      state.abandoned.insert(self.number);
    }
  }
}

/// Proof of admission; releases the next ticket on drop.
pub(crate) struct Pass<'a> {
  gate: &'a Gate,
}

impl Drop for Pass<'_> {
  fn drop(&mut self) { self.gate.state.borrow_mut().advance(); }
}

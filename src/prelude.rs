//! Prelude module for convenient imports

pub use crate::{
  disposable::{
    AnonymousDisposable, CompositeDisposable, Disposable, DisposePolicy, Subscription,
    TaskDisposable,
  },
  error::{Error, Result},
  observable::{self, observe, Observable, ObservableExt, ObservableRef},
  observer::{consume, AnonymousObserver, Consumer, Observer, ObserverCore, ObserverHooks, ObserverRef},
  ops::{concat, concat_op, filter, filter_op, Concat, Filter},
  promise::{CallbackId, Promise},
  scheduler::Scheduler,
  stream::{MultiStream, SingleStream},
};

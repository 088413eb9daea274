//! Scheduler handle
//!
//! aiorx never drives futures itself. Every background task (promise
//! continuations, source workers, deferred closes, cleanup after a failed
//! subscription) is handed to a [`Scheduler`], a cheap cloneable handle over
//! any single-threaded [`LocalSpawn`] implementation.

use std::{fmt, future::Future, rc::Rc};

use futures::{
  future::{abortable, AbortHandle},
  task::{LocalSpawn, LocalSpawnExt},
};

use crate::error::Result;

#[derive(Clone)]
pub struct Scheduler {
  spawner: Rc<dyn LocalSpawn>,
}

impl Scheduler {
  pub fn new<S: LocalSpawn + 'static>(spawner: S) -> Self { Scheduler { spawner: Rc::new(spawner) } }

  /// Schedule `task` to run to completion in the background.
  pub fn spawn<F>(&self, task: F) -> Result<()>
  where
    F: Future<Output = ()> + 'static,
  {
    self.spawner.spawn_local(task)?;
    Ok(())
  }

  /// Schedule `task` and return a handle that can abort it.
  ///
  /// Aborting drops the task at its next suspension point.
  pub fn spawn_abortable<F>(&self, task: F) -> Result<AbortHandle>
  where
    F: Future<Output = ()> + 'static,
  {
    let (task, handle) = abortable(task);
    self.spawner.spawn_local(async move {
      let _ = task.await;
    })?;
    Ok(handle)
  }

  /// Returns `true` if both handles spawn onto the same executor handle.
  pub fn same(&self, other: &Scheduler) -> bool { Rc::ptr_eq(&self.spawner, &other.spawner) }
}

impl fmt::Debug for Scheduler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_struct("Scheduler").finish_non_exhaustive() }
}

#[cfg(feature = "futures-scheduler")]
impl From<futures::executor::LocalSpawner> for Scheduler {
  fn from(spawner: futures::executor::LocalSpawner) -> Self { Scheduler::new(spawner) }
}

/// Spawner over `tokio::task::spawn_local`.
///
/// Tasks must be spawned from inside a `tokio::task::LocalSet`.
#[cfg(feature = "tokio-scheduler")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioLocal;

#[cfg(feature = "tokio-scheduler")]
impl LocalSpawn for TokioLocal {
  fn spawn_local_obj(
    &self, future: futures::task::LocalFutureObj<'static, ()>,
  ) -> std::result::Result<(), futures::task::SpawnError> {
    tokio::task::spawn_local(future);
    Ok(())
  }
}

#[cfg(feature = "tokio-scheduler")]
impl From<TokioLocal> for Scheduler {
  fn from(spawner: TokioLocal) -> Self { Scheduler::new(spawner) }
}

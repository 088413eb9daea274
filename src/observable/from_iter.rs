use crate::{
  disposable::{Subscription, TaskDisposable},
  error::Result,
  observable::{raise_from_source, Observable},
  observer::ObserverRef,
};

/// Creates an observable that sends every item of `iter`, then closes.
///
/// Each subscription starts one worker on the observer's scheduler that works
/// through its own clone of `iter`. A send that fails is raised on the same
/// observer and the worker stops. Disposing the subscription aborts the
/// worker.
///
/// ```
/// use aiorx::prelude::*;
///
/// let source = observable::from_iter(vec![1, 2, 3]);
/// ```
pub fn from_iter<I>(iter: I) -> FromIter<I>
where
  I: IntoIterator + Clone,
{
  FromIter(iter)
}

#[derive(Clone)]
pub struct FromIter<I>(I);

impl<I> Observable<I::Item> for FromIter<I>
where
  I: IntoIterator + Clone + 'static,
  I::Item: 'static,
{
  fn actual_observe(&self, observer: ObserverRef<I::Item>) -> Result<Subscription> {
    let items = self.0.clone();
    let scheduler = observer.scheduler().clone();
    let handle = scheduler.spawn_abortable(async move {
      for item in items {
        if let Err(err) = observer.asend(item).await {
          raise_from_source("from_iter", &*observer, err).await;
          return;
        }
      }
      observer.aclose().await;
    })?;
    Ok(Box::new(TaskDisposable::new(handle)))
  }
}

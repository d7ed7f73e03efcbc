//! The load barrier a document waits on before it renders.

use std::cell::RefCell;
use std::fmt;

use futures::future::{join_all, LocalBoxFuture};
use tracing::trace;

type Predicate = Box<dyn Fn() -> bool>;
type FutureProducer = Box<dyn Fn() -> LocalBoxFuture<'static, ()>>;

/// Collects load conditions and resolves once every one of them holds.
///
/// Predicates are polled; producers hand out a future for the work outstanding at the
/// time they are called, so loads registered while waiting are still awaited.
#[derive(Default)]
pub struct LoadBarrier {
    predicates: RefCell<Vec<Predicate>>,
    producers: RefCell<Vec<FutureProducer>>,
}

impl LoadBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `predicate` returns true.
    pub fn wait(&self, predicate: impl Fn() -> bool + 'static) {
        self.predicates.borrow_mut().push(Box::new(predicate));
    }

    /// Wait for the futures `producer` returns.
    pub fn wait_future(&self, producer: impl Fn() -> LocalBoxFuture<'static, ()> + 'static) {
        self.producers.borrow_mut().push(Box::new(producer));
    }

    /// True when every predicate holds.
    pub fn is_ready(&self) -> bool {
        self.predicates.borrow().iter().all(|predicate| predicate())
    }

    /// Resolve once all registered futures have settled and every predicate holds.
    pub async fn finish_loading(&self) {
        let mut rounds = 0usize;
        loop {
            let pending: Vec<_> = self.producers.borrow().iter().map(|produce| produce()).collect();
            join_all(pending).await;
            rounds += 1;
            if self.is_ready() {
                trace!(rounds, "Load barrier released");
                return;
            }
            tokio::task::yield_now().await;
        }
    }
}

impl fmt::Debug for LoadBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadBarrier")
            .field("predicates", &self.predicates.borrow().len())
            .field("producers", &self.producers.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::cell::Cell;
    use std::rc::Rc;

    #[tokio::test]
    async fn test_empty_barrier_is_ready() {
        let barrier = LoadBarrier::new();
        assert!(barrier.is_ready());
        barrier.finish_loading().await;
    }

    #[tokio::test]
    async fn test_waits_for_futures_then_predicates() {
        let barrier = LoadBarrier::new();
        let flag = Rc::new(Cell::new(false));

        let check = Rc::clone(&flag);
        barrier.wait(move || check.get());
        assert!(!barrier.is_ready());

        let set = Rc::clone(&flag);
        barrier.wait_future(move || {
            let set = Rc::clone(&set);
            async move {
                tokio::task::yield_now().await;
                set.set(true);
            }
            .boxed_local()
        });

        barrier.finish_loading().await;
        assert!(flag.get());
        assert!(barrier.is_ready());
    }

    #[tokio::test]
    async fn test_predicate_satisfied_across_rounds() {
        let barrier = LoadBarrier::new();
        let calls = Rc::new(Cell::new(0));

        let counter = Rc::clone(&calls);
        barrier.wait_future(move || {
            counter.set(counter.get() + 1);
            async {}.boxed_local()
        });
        let seen = Rc::clone(&calls);
        barrier.wait(move || seen.get() >= 3);

        barrier.finish_loading().await;
        assert_eq!(calls.get(), 3);
    }
}

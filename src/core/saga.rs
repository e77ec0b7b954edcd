//! Compensating actions for multi-record writes.
//!
//! The store has no transactions spanning several records. A [`Saga`] collects the undo
//! action of every completed step; when a later step fails, the undo actions run newest
//! first and the original error is returned to the caller.

use crate::errors::{Error, Result};
use futures::future::BoxFuture;
use std::future::Future;
use tracing::{debug, error, warn};

type Compensation<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<()>> + Send + 'a>;

/// An in-flight sequence of writes with their registered undo actions.
pub struct Saga<'a> {
    name: &'static str,
    compensations: Vec<(String, Compensation<'a>)>,
}

impl<'a> Saga<'a> {
    /// Starts an empty saga; `name` only appears in logs.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            compensations: Vec::new(),
        }
    }

    /// Registers the undo action for a step that has just succeeded.
    pub fn on_failure<F, Fut>(&mut self, step: impl Into<String>, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<()>> + Send + 'a,
    {
        self.compensations
            .push((step.into(), Box::new(move || Box::pin(undo()))));
    }

    /// Awaits one step. If it fails, every registered compensation runs before the
    /// error is handed back.
    pub async fn run<T>(&mut self, step: impl Future<Output = Result<T>>) -> Result<T> {
        match step.await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.compensate(&err).await;
                Err(err)
            }
        }
    }

    /// Rolls back for an error raised outside [`Saga::run`].
    pub async fn fail<T>(&mut self, err: Error) -> Result<T> {
        self.compensate(&err).await;
        Err(err)
    }

    /// Number of undo actions currently registered.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.compensations.len()
    }

    /// Finishes the saga; registered compensations are discarded.
    pub fn commit(self) {
        debug!(
            "Saga '{}' committed ({} compensations discarded)",
            self.name,
            self.compensations.len()
        );
    }

    async fn compensate(&mut self, cause: &Error) {
        warn!("Saga '{}' failed: {cause}; rolling back", self.name);
        while let Some((step, undo)) = self.compensations.pop() {
            match undo().await {
                Ok(()) => debug!("Saga '{}' undid '{step}'", self.name),
                Err(err) => error!(
                    "Saga '{}' could not undo '{step}': {err}; manual reconciliation needed",
                    self.name
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::{Arc, Mutex};

    fn failing_step() -> impl Future<Output = Result<()>> {
        async {
            Err(Error::Validation {
                message: "boom".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_compensations_run_newest_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut saga = Saga::new("test");

        for step in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            saga.run(async { Ok(()) }).await.unwrap();
            saga.on_failure(step, move || async move {
                log.lock().unwrap().push(step);
                Ok(())
            });
        }

        let result = saga.run(failing_step()).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
        assert_eq!(saga.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_compensation_does_not_stop_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut saga = Saga::new("test");

        let first = Arc::clone(&log);
        saga.on_failure("first", move || async move {
            first.lock().unwrap().push("first");
            Ok(())
        });
        saga.on_failure("second", || async {
            Err(Error::Validation {
                message: "undo failed".to_string(),
            })
        });

        let result = saga.run(failing_step()).await;
        match result {
            Err(Error::Validation { message }) => assert_eq!(message, "boom"),
            other => panic!("expected original error, got {other:?}"),
        }
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_commit_discards_compensations() {
        let log = Arc::new(Mutex::new(Vec::<&str>::new()));
        let mut saga = Saga::new("test");
        let inner = Arc::clone(&log);
        saga.on_failure("step", move || async move {
            inner.lock().unwrap().push("undone");
            Ok(())
        });
        assert_eq!(saga.pending(), 1);

        saga.commit();
        assert!(log.lock().unwrap().is_empty());
    }
}

//! Compensation stack for multi-step operations.
//!
//! Each completed step may register an undo action. When a later step
//! fails, the registered actions run in reverse order before the error is
//! returned. Compensation failures are logged and do not mask the original
//! error.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, error};

use crate::error::{ServiceError, ServiceResult};

type Compensation = Pin<Box<dyn Future<Output = ServiceResult<()>> + Send>>;

pub struct Saga {
    name: &'static str,
    compensations: Vec<(&'static str, Compensation)>,
}

impl Saga {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            compensations: Vec::new(),
        }
    }

    /// Runs `action`; on success registers the compensation built from its
    /// output, on failure unwinds everything registered so far.
    pub async fn step<T, E, A, C, F>(
        &mut self,
        step: &'static str,
        action: A,
        compensate: C,
    ) -> ServiceResult<T>
    where
        A: Future<Output = Result<T, E>>,
        E: Into<ServiceError>,
        C: FnOnce(&T) -> F,
        F: Future<Output = ServiceResult<()>> + Send + 'static,
    {
        let output = self.run(step, action).await?;
        self.compensations.push((step, Box::pin(compensate(&output))));
        Ok(output)
    }

    /// Runs a step that has nothing to undo.
    pub async fn run<T, E, A>(&mut self, step: &'static str, action: A) -> ServiceResult<T>
    where
        A: Future<Output = Result<T, E>>,
        E: Into<ServiceError>,
    {
        match action.await {
            Ok(output) => {
                debug!(saga = self.name, step, "Saga step completed");
                Ok(output)
            }
            Err(err) => {
                let err = err.into();
                error!(saga = self.name, step, error = %err, "Saga step failed, compensating");
                self.unwind().await;
                Err(err)
            }
        }
    }

    /// Runs registered compensations, newest first.
    pub async fn unwind(&mut self) {
        while let Some((step, compensation)) = self.compensations.pop() {
            match compensation.await {
                Ok(()) => debug!(saga = self.name, step, "Compensated"),
                Err(err) => error!(
                    saga = self.name,
                    step,
                    error = %err,
                    "Compensation failed; manual cleanup required"
                ),
            }
        }
    }

    /// Forgets the registered compensations.
    pub fn commit(self) {
        debug!(saga = self.name, steps = self.compensations.len(), "Saga committed");
    }
}

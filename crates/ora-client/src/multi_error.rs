//! Error aggregation for cascading close.
//!
//! Closing a node closes every child first. A child that fails, or panics,
//! must not stop its siblings from being closed or the parent from releasing
//! its own handles, so each step runs through [`ErrorCollector::run`] and the
//! failures are reported together at the end as one [`MultiError`].

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{Error, Result};
use crate::state::ResourceId;

/// One failure recorded during a cascading close.
#[derive(Debug)]
pub struct Failure {
    /// The node whose close step failed.
    pub source: ResourceId,
    /// The original error, unchanged.
    pub error: Error,
}

/// Every failure collected while closing one node and its children.
#[derive(Debug)]
pub struct MultiError {
    scope: ResourceId,
    failures: Vec<Failure>,
}

impl MultiError {
    /// Get the node whose close produced this aggregate.
    #[must_use]
    pub fn scope(&self) -> ResourceId {
        self.scope
    }

    /// Number of contributing failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Always false: an aggregate is only built from at least one failure.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Get the contributing failures in the order they occurred.
    #[must_use]
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Iterate the contributing errors.
    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.failures.iter().map(|failure| &failure.error)
    }

    /// Consume the aggregate, returning the failures.
    #[must_use]
    pub fn into_failures(self) -> Vec<Failure> {
        self.failures
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.failures.len() == 1 { "error" } else { "errors" };
        write!(f, "{} {noun} closing {}", self.failures.len(), self.scope)?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}[{}] {}", failure.source, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|failure| &failure.error as &(dyn std::error::Error + 'static))
    }
}

/// Collects the outcome of every step of one cascading close.
#[derive(Debug)]
pub(crate) struct ErrorCollector {
    scope: ResourceId,
    failures: Vec<Failure>,
}

impl ErrorCollector {
    pub(crate) fn new(scope: ResourceId) -> Self {
        Self {
            scope,
            failures: Vec::new(),
        }
    }

    /// Record the result of one step; `Ok` results are dropped.
    pub(crate) fn push(&mut self, source: ResourceId, result: Result<()>) {
        if let Err(error) = result {
            self.failures.push(Failure { source, error });
        }
    }

    /// Run one close step behind a fault barrier and record its outcome.
    ///
    /// A panic inside `step` is caught and recorded as
    /// [`Error::InternalFault`]; the caller carries on with the next step.
    pub(crate) fn run(&mut self, source: ResourceId, step: impl FnOnce() -> Result<()>) {
        let result = catch_fault(step).and_then(|result| result);
        self.push(source, result);
    }

    /// Collapse into `Ok(())` if nothing failed, else one [`MultiError`].
    pub(crate) fn finish(self) -> Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        Err(Error::Multi(MultiError {
            scope: self.scope,
            failures: self.failures,
        }))
    }
}

/// Run `f`, converting a panic into [`Error::InternalFault`].
pub(crate) fn catch_fault<R>(f: impl FnOnce() -> R) -> Result<R> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let description = describe_panic(payload.as_ref());
        tracing::warn!(fault = %description, "intercepted fault during close");
        Error::InternalFault(description)
    })
}

fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::state::ResourceKind;

    fn server(id: u64) -> ResourceId {
        ResourceId::new(ResourceKind::Server, id)
    }

    #[test]
    fn test_all_ok_collapses_to_ok() {
        let mut errors = ErrorCollector::new(ResourceId::new(ResourceKind::Environment, 1));
        errors.push(server(1), Ok(()));
        errors.run(server(2), || Ok(()));
        assert!(errors.finish().is_ok());
    }

    #[test]
    fn test_single_failure_is_still_multi() {
        let mut errors = ErrorCollector::new(ResourceId::new(ResourceKind::Environment, 1));
        errors.push(server(1), Ok(()));
        errors.push(server(2), Err(Error::Native("ORA-03113: end-of-file".into())));

        let err = errors.finish().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MultiError);
        let multi = err.as_multi().unwrap();
        assert_eq!(multi.len(), 1);
        assert_eq!(multi.failures()[0].source, server(2));
        assert_eq!(
            err.to_string(),
            "1 error closing environment 1: [server 2] ORA-03113: end-of-file"
        );
    }

    #[test]
    fn test_display_enumerates_every_failure() {
        let mut errors = ErrorCollector::new(ResourceId::new(ResourceKind::Environment, 3));
        errors.push(server(1), Err(Error::Native("first".into())));
        errors.push(
            ResourceId::new(ResourceKind::Connection, 2),
            Err(Error::AllocationFailed("unable to free session handle".into())),
        );

        let text = errors.finish().unwrap_err().to_string();
        assert_eq!(
            text,
            "2 errors closing environment 3: [server 1] first; \
             [connection 2] allocation failed: unable to free session handle"
        );
    }

    #[test]
    fn test_sub_errors_preserved() {
        let mut errors = ErrorCollector::new(ResourceId::new(ResourceKind::Server, 1));
        errors.push(server(1), Err(Error::Native("ORA-01012: not logged on".into())));
        let err = errors.finish().unwrap_err();

        let multi = err.as_multi().unwrap();
        let inner: Vec<String> = multi.errors().map(ToString::to_string).collect();
        assert_eq!(inner, ["ORA-01012: not logged on"]);
        assert!(std::error::Error::source(multi).is_some());
    }

    #[test]
    fn test_run_converts_panic_to_internal_fault() {
        let mut errors = ErrorCollector::new(ResourceId::new(ResourceKind::Environment, 1));
        errors.run(server(1), || panic!("handle table corrupted"));
        errors.run(server(2), || Ok(()));

        let err = errors.finish().unwrap_err();
        let multi = err.as_multi().unwrap();
        assert_eq!(multi.len(), 1);
        let failure = &multi.failures()[0];
        assert_eq!(failure.source, server(1));
        assert_eq!(failure.error.kind(), ErrorKind::InternalFault);
        assert!(failure.error.to_string().contains("handle table corrupted"));
    }

    #[test]
    fn test_describe_formatted_panic() {
        let result = catch_fault(|| -> u32 { panic!("bad handle {}", 7) });
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "internal fault: bad handle 7");
    }

    #[test]
    fn test_catch_fault_passes_value_through() {
        assert_eq!(catch_fault(|| 5).unwrap(), 5);
    }
}

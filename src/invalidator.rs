//! Invalidators: named, phased validation rules.
//!
//! An invalidator wraps a raw check `Fn(value, invalidate) -> impl Future`.
//! Each run is a [`CancellableTask`]; starting a new run cancels the previous
//! one, and the [`Invalidate`] handed to the raw check silently drops any
//! reason reported after its task was cancelled. Raw checks therefore never
//! need to handle cancellation themselves.
//!
//! # Example
//!
//! ```rust
//! use formcheck::invalidator::{Invalidate, InvalidatorOptions, Phase};
//! use std::time::Duration;
//!
//! let options = InvalidatorOptions::new()
//!     .with_name("username-available")
//!     .with_phase(Phase::AfterOthers)
//!     .with_debounce(Duration::from_millis(500));
//!
//! assert_eq!(options.phase(), Phase::AfterOthers);
//!
//! let _check = |value: String, invalidate: Invalidate| async move {
//!     if value == "admin" {
//!         invalidate.invalidate("This username is in use");
//!     }
//! };
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::TaskError;
use crate::task::{CancelSignal, CancellableTask, TaskHandle};

/// Execution stage of an invalidator.
///
/// Phases run strictly in declaration order. A phase only starts if every
/// earlier phase left the field valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Phase {
    /// Runs first. The built-in `required` checks live here.
    WithInitial,
    /// Runs once the initial checks passed. The built-in match check lives here.
    AfterInitial,
    /// The standard checks: lengths, bounds, patterns.
    #[default]
    WithOthers,
    /// Runs only after every other check passed. Use for expensive remote checks.
    AfterOthers,
}

impl Phase {
    /// Every phase, in execution order.
    pub const ALL: [Phase; 4] = [
        Phase::WithInitial,
        Phase::AfterInitial,
        Phase::WithOthers,
        Phase::AfterOthers,
    ];

    /// Kebab-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::WithInitial => "with-initial",
            Phase::AfterInitial => "after-initial",
            Phase::WithOthers => "with-others",
            Phase::AfterOthers => "after-others",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "proptest")]
impl proptest::arbitrary::Arbitrary for Phase {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        use proptest::prelude::*;
        prop_oneof![
            Just(Phase::WithInitial),
            Just(Phase::AfterInitial),
            Just(Phase::WithOthers),
            Just(Phase::AfterOthers),
        ]
        .boxed()
    }
}

/// Options for [`Field::add_invalidator`](crate::field::Field::add_invalidator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidatorOptions {
    name: String,
    phase: Phase,
    debounce: Option<Duration>,
}

impl InvalidatorOptions {
    /// `with-others`, no debounce, named `"custom"`.
    pub fn new() -> Self {
        Self {
            name: "custom".to_string(),
            phase: Phase::default(),
            debounce: None,
        }
    }

    /// Name used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Phase the check runs in.
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Wait this long before running; a newer check during the wait cancels this one.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    /// Configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Configured debounce.
    pub fn debounce(&self) -> Option<Duration> {
        self.debounce
    }
}

impl Default for InvalidatorOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver of invalidation reasons for one field.
pub(crate) type ReasonSink = Arc<dyn Fn(String) + Send + Sync>;

/// The `invalidate` callback handed to a raw check.
///
/// Calls made after the owning run was cancelled are dropped.
#[derive(Clone)]
pub struct Invalidate {
    signal: CancelSignal,
    sink: ReasonSink,
    invalidator: Arc<str>,
}

impl Invalidate {
    /// Mark the field invalid with `reason`, unless this run was cancelled.
    pub fn invalidate(&self, reason: impl Into<String>) {
        if self.signal.is_cancelled() {
            tracing::trace!(
                invalidator = %self.invalidator,
                "dropping invalidation from a cancelled run"
            );
            return;
        }
        (self.sink)(reason.into());
    }

    /// Whether the run this callback belongs to has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// The run's cancellation signal, for checks that want to stop early.
    pub fn signal(&self) -> &CancelSignal {
        &self.signal
    }
}

impl fmt::Debug for Invalidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidate")
            .field("invalidator", &self.invalidator)
            .field("cancelled", &self.signal.is_cancelled())
            .finish()
    }
}

/// Output types a raw check may produce.
///
/// `()` always completes the run; `Err` from a `Result` rejects it, which makes
/// the field invalid for that run.
pub trait CheckOutcome {
    /// Convert into the task result.
    fn into_check_result(self) -> Result<(), TaskError>;
}

impl CheckOutcome for () {
    fn into_check_result(self) -> Result<(), TaskError> {
        Ok(())
    }
}

impl<E: fmt::Display> CheckOutcome for Result<(), E> {
    fn into_check_result(self) -> Result<(), TaskError> {
        self.map_err(|e| TaskError::Failed(e.to_string()))
    }
}

type BoxedCheck =
    Arc<dyn Fn(String, Invalidate) -> BoxFuture<'static, Result<(), TaskError>> + Send + Sync>;

/// A single validation rule attached to a field.
pub struct Invalidator {
    name: Arc<str>,
    phase: Phase,
    debounce: Option<Duration>,
    check: BoxedCheck,
    running: Option<TaskHandle>,
}

impl Invalidator {
    /// Wrap a raw check.
    pub fn new<F, Fut>(check: F, options: InvalidatorOptions) -> Self
    where
        F: Fn(String, Invalidate) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: CheckOutcome,
    {
        let check: BoxedCheck = Arc::new(move |value: String, invalidate: Invalidate| {
            check(value, invalidate)
                .map(CheckOutcome::into_check_result)
                .boxed()
        });
        Self {
            name: Arc::from(options.name),
            phase: options.phase,
            debounce: options.debounce,
            check,
            running: None,
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Phase the check runs in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Debounce window.
    pub fn debounce(&self) -> Option<Duration> {
        self.debounce
    }

    /// Whether a started run has not been cancelled yet.
    pub fn has_running_instance(&self) -> bool {
        self.running.as_ref().is_some_and(|h| !h.is_cancelled())
    }

    /// Cancel the most recent run, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.running.take() {
            handle.cancel();
        }
    }

    /// Start a new run against `value`, cancelling the previous one.
    ///
    /// Reasons reported by the raw check are forwarded to `sink` while the
    /// returned task has not been cancelled.
    pub(crate) fn start(&mut self, value: String, sink: ReasonSink) -> CancellableTask<()> {
        self.cancel();

        let check = self.check.clone();
        let debounce = self.debounce;
        let name = self.name.clone();

        let task = CancellableTask::new(move |signal| async move {
            if let Some(delay) = debounce {
                tokio::time::sleep(delay).await;
                if signal.is_cancelled() {
                    return Ok(());
                }
            }
            let invalidate = Invalidate {
                signal,
                sink,
                invalidator: name,
            };
            check(value, invalidate).await
        });

        self.running = Some(task.handle());
        task
    }
}

impl fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidator")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("debounce", &self.debounce)
            .field("running", &self.has_running_instance())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collecting_sink() -> (Arc<Mutex<Vec<String>>>, ReasonSink) {
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let sink = reasons.clone();
        (
            reasons,
            Arc::new(move |reason| sink.lock().unwrap().push(reason)),
        )
    }

    #[test]
    fn phases_are_ordered() {
        let mut shuffled = vec![
            Phase::AfterOthers,
            Phase::WithInitial,
            Phase::WithOthers,
            Phase::AfterInitial,
        ];
        shuffled.sort();
        assert_eq!(shuffled, Phase::ALL.to_vec());
        assert_eq!(Phase::default(), Phase::WithOthers);
        assert_eq!(Phase::AfterInitial.to_string(), "after-initial");
    }

    #[tokio::test]
    async fn forwards_reasons_from_raw_check() {
        let (reasons, sink) = collecting_sink();
        let mut inv = Invalidator::new(
            |value: String, invalidate: Invalidate| async move {
                if value.is_empty() {
                    invalidate.invalidate("empty");
                }
            },
            InvalidatorOptions::new(),
        );

        assert_eq!(inv.start(String::new(), sink).await, Ok(()));
        assert_eq!(*reasons.lock().unwrap(), vec!["empty".to_string()]);
    }

    #[tokio::test]
    async fn raw_check_error_rejects() {
        let (_, sink) = collecting_sink();
        let mut inv = Invalidator::new(
            |_: String, _: Invalidate| async { Err::<(), _>("network down") },
            InvalidatorOptions::new(),
        );

        assert_eq!(
            inv.start("x".into(), sink).await,
            Err(TaskError::Failed("network down".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn starting_again_cancels_previous_run() {
        let (reasons, sink) = collecting_sink();
        let mut inv = Invalidator::new(
            |value: String, invalidate: Invalidate| async move {
                invalidate.invalidate(value);
            },
            InvalidatorOptions::new().with_debounce(Duration::from_millis(100)),
        );

        let first = inv.start("first".into(), sink.clone());
        let second = inv.start("second".into(), sink);

        assert_eq!(first.await, Err(TaskError::Cancelled));
        assert_eq!(second.await, Ok(()));
        assert_eq!(*reasons.lock().unwrap(), vec!["second".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn late_invalidate_after_cancel_is_dropped() {
        let (reasons, sink) = collecting_sink();
        let (tx, rx) = tokio::sync::oneshot::channel::<Invalidate>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let mut inv = Invalidator::new(
            move |_: String, invalidate: Invalidate| {
                let tx = tx.clone();
                async move {
                    if let Some(tx) = tx.lock().unwrap().take() {
                        let _ = tx.send(invalidate);
                    }
                }
            },
            InvalidatorOptions::new(),
        );

        inv.start("v".into(), sink).await.unwrap();
        let escaped = rx.await.unwrap();
        inv.cancel();

        escaped.invalidate("too late");
        assert!(escaped.is_cancelled());
        assert!(reasons.lock().unwrap().is_empty());
    }
}

//! Polling helpers for eventually consistent backend state
//!
//! The backend can answer "not found" for a short while after an object was
//! created. [`wait_for_dependency`] keeps probing until the object shows up,
//! a real error occurs, or the budget is spent. [`OpContext`] carries the
//! caller's own deadline and cancellation flag so a wait can be cut short
//! from outside (Ctrl-C in the binaries, the request timeout in the host).

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::error::PrismError;

/// Longest single sleep, so cancellation is noticed promptly
const WAKE_SLICE: Duration = Duration::from_millis(100);

/// Why an operation stopped before it was done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Cancelled => f.write_str("context cancelled"),
            Interrupt::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Caller-supplied deadline and cancellation flag for one operation
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    deadline: Option<Instant>,
    cancel: Arc<AtomicBool>,
}

impl OpContext {
    /// No deadline, never cancelled unless [`cancel`](Self::cancel) is called
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            cancel: Arc::default(),
        }
    }

    /// Share an existing flag, e.g. one flipped by a signal handler
    pub fn with_cancel_flag(cancel: Arc<AtomicBool>) -> Self {
        Self {
            deadline: None,
            cancel,
        }
    }

    /// Same cancellation flag, deadline tightened to at most `timeout` from now.
    ///
    /// A timeout too large to represent as an instant adds no deadline.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let extra = timeout.and_then(|t| Instant::now().checked_add(t));
        let deadline = match (self.deadline, extra) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            deadline,
            cancel: Arc::clone(&self.cancel),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Cancellation wins over an expired deadline
    pub fn check(&self) -> Result<(), Interrupt> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupt::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Sleep for `duration`, waking early on cancellation or deadline
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupt> {
        let until = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            let mut slice = (until - now).min(WAKE_SLICE);
            if let Some(deadline) = self.deadline {
                slice = slice.min(deadline.saturating_duration_since(now));
            }
            thread::sleep(slice);
        }
    }
}

/// Overall budget and poll interval for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollPolicy {
    /// Waiting for an assignment's referenced objects to become visible
    pub const fn dependency() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            interval: Duration::from_secs(2),
        }
    }

    /// Waiting for cascaded assignment deletes to settle
    pub const fn cascade() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("error checking {kind} \"{id}\": {source}")]
    Probe {
        kind: String,
        id: String,
        #[source]
        source: PrismError,
    },

    #[error("timed out after {}s waiting for {kind} \"{id}\"", .timeout.as_secs())]
    TimedOut {
        kind: String,
        id: String,
        timeout: Duration,
    },

    #[error("{reason} while waiting for {kind} \"{id}\"")]
    Interrupted {
        kind: String,
        id: String,
        reason: Interrupt,
    },
}

/// Probe until the dependency exists, using the default 60s/2s policy
pub fn wait_for_dependency<F>(ctx: &OpContext, kind: &str, id: &str, probe: F) -> Result<(), WaitError>
where
    F: FnMut() -> Result<(), PrismError>,
{
    wait_for_dependency_with(ctx, PollPolicy::dependency(), kind, id, probe)
}

/// Probe until the dependency exists.
///
/// Not-found answers are retried every `policy.interval`; any other error is
/// returned at once. The internal budget and the context deadline are tracked
/// separately so the caller can tell them apart.
pub fn wait_for_dependency_with<F>(
    ctx: &OpContext,
    policy: PollPolicy,
    kind: &str,
    id: &str,
    mut probe: F,
) -> Result<(), WaitError>
where
    F: FnMut() -> Result<(), PrismError>,
{
    let started = Instant::now();
    let budget_end = started + policy.timeout;
    let interrupted = |reason| WaitError::Interrupted {
        kind: kind.to_string(),
        id: id.to_string(),
        reason,
    };

    let mut attempt: u32 = 0;
    loop {
        ctx.check().map_err(interrupted)?;
        attempt += 1;

        match probe() {
            Ok(()) => {
                tracing::debug!(kind, id, attempt, "dependency visible");
                return Ok(());
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!(kind, id, attempt, error = %err, "dependency not visible yet");
            }
            Err(err) => {
                return Err(WaitError::Probe {
                    kind: kind.to_string(),
                    id: id.to_string(),
                    source: err,
                });
            }
        }

        let now = Instant::now();
        if now >= budget_end {
            return Err(WaitError::TimedOut {
                kind: kind.to_string(),
                id: id.to_string(),
                timeout: policy.timeout,
            });
        }

        let pause = policy.interval.min(budget_end - now);
        ctx.sleep(pause).map_err(interrupted)?;
    }
}

//! Termination of a process together with its descendants and threads.
//!
//! One request runs to completion through resolve, enumerate, signal,
//! await and report, and yields one [`TerminationResult`] per victim.

use super::provider::{Pid, ProcessProvider, ProviderError, Signal};
use std::time::{Duration, Instant};

/// Final state of one victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Terminated,
    NotFound,
    AccessDenied,
    TimedOut,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::Terminated => "terminated",
            Self::NotFound => "not found",
            Self::AccessDenied => "access denied",
            Self::TimedOut => "timed out",
        }
    }
}

/// How a victim relates to the requested pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VictimKind {
    Target,
    Child,
    Thread,
}

impl VictimKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Target => "process",
            Self::Child => "child",
            Self::Thread => "thread",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationResult {
    pub pid: Pid,
    pub kind: VictimKind,
    pub outcome: Outcome,
    /// Provider message when the signal failed for a reason other than
    /// permissions or a missing process.
    pub error: Option<String>,
}

/// Tally of outcomes in a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub terminated: usize,
    pub not_found: usize,
    pub access_denied: usize,
    pub timed_out: usize,
}

/// Per-victim results of one termination request, in signalling order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationReport {
    pub target: Pid,
    pub results: Vec<TerminationResult>,
}

impl TerminationReport {
    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for result in &self.results {
            match result.outcome {
                Outcome::Terminated => counts.terminated += 1,
                Outcome::NotFound => counts.not_found += 1,
                Outcome::AccessDenied => counts.access_denied += 1,
                Outcome::TimedOut => counts.timed_out += 1,
            }
        }
        counts
    }

    pub fn target_outcome(&self) -> Option<Outcome> {
        self.results
            .iter()
            .find(|r| r.kind == VictimKind::Target)
            .map(|r| r.outcome)
    }

    /// Every victim was terminated.
    pub fn is_complete(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.outcome == Outcome::Terminated)
    }
}

/// Timeouts and scope of a termination request.
#[derive(Debug, Clone)]
pub struct TerminationPolicy {
    /// How long victims get to exit after the polite signal.
    pub timeout: Duration,
    /// Send a forceful kill to survivors at the deadline.
    pub escalate: bool,
    /// Extra wait after an escalated kill.
    pub kill_grace: Duration,
    pub include_children: bool,
    pub poll_interval: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            escalate: false,
            kill_grace: Duration::from_secs(1),
            include_children: true,
            poll_interval: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone)]
struct Victim {
    pid: Pid,
    kind: VictimKind,
    /// `None` while still waiting for it to exit.
    outcome: Option<Outcome>,
    error: Option<String>,
}

/// Drives termination requests against a provider.
pub struct TerminationController<'a, P: ProcessProvider + ?Sized> {
    provider: &'a mut P,
    policy: TerminationPolicy,
}

impl<'a, P: ProcessProvider + ?Sized> TerminationController<'a, P> {
    pub fn new(provider: &'a mut P, policy: TerminationPolicy) -> Self {
        Self { provider, policy }
    }

    /// Terminate `pid`, its descendants and its threads.
    pub fn terminate(&mut self, pid: Pid) -> TerminationReport {
        if !self.provider.is_alive(pid) {
            tracing::info!(pid, "termination target already gone");
            return TerminationReport {
                target: pid,
                results: vec![TerminationResult {
                    pid,
                    kind: VictimKind::Target,
                    outcome: Outcome::NotFound,
                    error: None,
                }],
            };
        }

        let mut victims = self.enumerate(pid);
        tracing::info!(pid, victims = victims.len(), "terminating process");

        self.signal_all(&mut victims, Signal::Terminate);
        self.await_exit(&mut victims, self.policy.timeout);

        if self.policy.escalate && victims.iter().any(|v| v.outcome.is_none()) {
            tracing::warn!(pid, "escalating to forced kill");
            self.signal_all(&mut victims, Signal::Kill);
            self.await_exit(&mut victims, self.policy.kill_grace);
        }

        let results: Vec<TerminationResult> = victims
            .into_iter()
            .map(|v| TerminationResult {
                pid: v.pid,
                kind: v.kind,
                outcome: v.outcome.unwrap_or(Outcome::TimedOut),
                error: v.error,
            })
            .collect();
        for result in results.iter().filter(|r| r.outcome != Outcome::Terminated) {
            tracing::warn!(
                pid = result.pid,
                kind = result.kind.label(),
                outcome = result.outcome.label(),
                error = result.error.as_deref().unwrap_or(""),
                "victim not terminated"
            );
        }
        TerminationReport {
            target: pid,
            results,
        }
    }

    /// Descendants deepest first, then threads, then the target itself.
    fn enumerate(&mut self, pid: Pid) -> Vec<Victim> {
        let mut victims: Vec<Victim> = Vec::new();
        let push = |victims: &mut Vec<Victim>, id: Pid, kind: VictimKind| {
            if id != pid && !victims.iter().any(|v| v.pid == id) {
                victims.push(Victim {
                    pid: id,
                    kind,
                    outcome: None,
                    error: None,
                });
            }
        };

        if self.policy.include_children {
            match self.provider.descendants(pid) {
                Ok(children) => {
                    for child in children {
                        push(&mut victims, child, VictimKind::Child);
                    }
                }
                Err(err) => tracing::warn!(pid, error = %err, "could not enumerate children"),
            }
        }

        match self.provider.threads(pid) {
            Ok(threads) => {
                for thread in threads {
                    push(&mut victims, thread.thread_id, VictimKind::Thread);
                }
            }
            Err(err) => tracing::debug!(pid, error = %err, "could not enumerate threads"),
        }

        victims.push(Victim {
            pid,
            kind: VictimKind::Target,
            outcome: None,
            error: None,
        });
        victims
    }

    /// Signal every pending process victim in order. Threads are covered by
    /// the target's signal.
    fn signal_all(&mut self, victims: &mut [Victim], signal: Signal) {
        let mut target_denied = false;
        let mut target_gone = false;
        let mut target_error: Option<String> = None;

        for victim in victims.iter_mut().filter(|v| v.outcome.is_none()) {
            if victim.kind == VictimKind::Thread {
                if signal == Signal::Terminate && !self.provider.is_alive(victim.pid) {
                    victim.outcome = Some(Outcome::NotFound);
                }
                continue;
            }

            match self.provider.signal(victim.pid, signal) {
                Ok(()) => {
                    tracing::debug!(pid = victim.pid, ?signal, "signal sent");
                }
                Err(ProviderError::NotFound(_)) => {
                    // Already exited before the polite signal, or between the
                    // deadline and the kill.
                    victim.outcome = Some(if signal == Signal::Terminate {
                        Outcome::NotFound
                    } else {
                        Outcome::Terminated
                    });
                    target_gone |= victim.kind == VictimKind::Target;
                }
                Err(ProviderError::AccessDenied(_)) => {
                    victim.outcome = Some(Outcome::AccessDenied);
                    target_denied |= victim.kind == VictimKind::Target;
                }
                Err(err) => {
                    tracing::warn!(pid = victim.pid, error = %err, "signal failed");
                    victim.outcome = Some(Outcome::AccessDenied);
                    victim.error = Some(err.to_string());
                    if victim.kind == VictimKind::Target {
                        target_denied = true;
                        target_error = victim.error.clone();
                    }
                }
            }
        }

        if target_denied || target_gone {
            let inherited = if target_denied {
                Outcome::AccessDenied
            } else {
                Outcome::NotFound
            };
            for victim in victims
                .iter_mut()
                .filter(|v| v.kind == VictimKind::Thread && v.outcome.is_none())
            {
                victim.outcome = Some(inherited);
                victim.error = target_error.clone();
            }
        }
    }

    /// Poll pending victims until they exit or `window` runs out.
    fn await_exit(&mut self, victims: &mut [Victim], window: Duration) {
        let deadline = Instant::now() + window;
        loop {
            for victim in victims.iter_mut().filter(|v| v.outcome.is_none()) {
                if !self.provider.is_alive(victim.pid) {
                    victim.outcome = Some(Outcome::Terminated);
                }
            }
            if victims.iter().all(|v| v.outcome.is_some()) || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(self.policy.poll_interval.min(window));
        }
    }
}

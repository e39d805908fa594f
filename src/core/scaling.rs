//! Periodic pool sizing.
//!
//! Every `scale_interval` the [`ScalingController`] takes a [`ScalingSnapshot`],
//! restores the `min_workers` floor if a crash replacement was lost, then asks its
//! [`ScalingPolicy`] for a [`ScalingDecision`] and applies it within the pool bounds.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;

/// Pool state the policy decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingSnapshot {
    /// Registered workers.
    pub total_workers: usize,
    /// Workers claimed for or running a task.
    pub busy_workers: usize,
    /// Workers available for dispatch.
    pub idle_workers: usize,
    /// Tasks waiting in the queue.
    pub queue_length: usize,
    /// Configured lower bound.
    pub min_workers: usize,
    /// Configured upper bound.
    pub max_workers: usize,
}

impl ScalingSnapshot {
    /// `busy / total`, `1.0` for an empty pool.
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        if self.total_workers == 0 {
            1.0
        } else {
            self.busy_workers as f64 / self.total_workers as f64
        }
    }
}

/// What a policy wants done this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalingDecision {
    /// Leave the pool alone.
    Hold,
    /// Add `count` workers.
    ScaleUp {
        /// Workers to add.
        count: usize,
        /// Human-readable trigger.
        reason: String,
    },
    /// Remove up to `count` idle workers.
    ScaleDown {
        /// Workers to remove.
        count: usize,
        /// Human-readable trigger.
        reason: String,
    },
}

/// Decides pool size changes from a snapshot.
pub trait ScalingPolicy: Send + Sync {
    /// Policy name for logs.
    fn name(&self) -> &str;

    /// Decide for one cycle. Counts are clamped to the pool bounds by the controller.
    fn evaluate(&self, snapshot: &ScalingSnapshot) -> ScalingDecision;
}

/// Utilization threshold policy.
///
/// Scales up by `scale_step` when utilization exceeds `upper` and tasks are waiting;
/// scales down by `scale_step` when utilization is below `lower` and the queue is empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    upper: f64,
    lower: f64,
    scale_step: usize,
}

impl ThresholdPolicy {
    /// Policy with explicit thresholds.
    pub const fn new(lower: f64, upper: f64, scale_step: usize) -> Self {
        Self {
            upper,
            lower,
            scale_step,
        }
    }

    /// Policy using the configured thresholds and step.
    pub const fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(
            config.lower_threshold,
            config.upper_threshold,
            config.scale_step,
        )
    }
}

impl ScalingPolicy for ThresholdPolicy {
    fn name(&self) -> &str {
        "threshold"
    }

    fn evaluate(&self, s: &ScalingSnapshot) -> ScalingDecision {
        let utilization = s.utilization();
        if utilization > self.upper && s.queue_length > 0 && s.total_workers < s.max_workers {
            return ScalingDecision::ScaleUp {
                count: self.scale_step.min(s.max_workers - s.total_workers),
                reason: format!(
                    "utilization {utilization:.2} > {:.2} with {} queued",
                    self.upper, s.queue_length
                ),
            };
        }
        if utilization < self.lower && s.queue_length == 0 && s.total_workers > s.min_workers {
            return ScalingDecision::ScaleDown {
                count: self.scale_step.min(s.total_workers - s.min_workers),
                reason: format!("utilization {utilization:.2} < {:.2}", self.lower),
            };
        }
        ScalingDecision::Hold
    }
}

/// Outcome of one scaling pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingReport {
    /// Snapshot the decision was made on.
    pub snapshot: ScalingSnapshot,
    /// Policy decision.
    pub decision: ScalingDecision,
    /// Workers created to restore `min_workers` before the policy ran.
    pub reconciled: usize,
    /// Workers created by the decision.
    pub created: usize,
    /// Workers removed by the decision.
    pub removed: usize,
}

/// Pool operations the controller needs.
pub(crate) trait ScalingTarget: Send + Sync {
    fn snapshot(&self) -> ScalingSnapshot;
    fn is_stopped(&self) -> bool;
    /// Create up to `count` workers; returns how many were created.
    fn grow(&self, count: usize) -> usize;
    /// Remove up to `count` workers idle for at least `grace`; returns how many went.
    fn shrink(&self, count: usize, grace: Duration) -> usize;
}

/// Runs a [`ScalingPolicy`] against the pool.
pub struct ScalingController {
    policy: Box<dyn ScalingPolicy>,
    interval: Duration,
    idle_grace: Duration,
}

impl std::fmt::Debug for ScalingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalingController")
            .field("policy", &self.policy.name())
            .field("interval", &self.interval)
            .field("idle_grace", &self.idle_grace)
            .finish()
    }
}

impl ScalingController {
    /// Controller with the given policy and the configured interval and grace.
    pub fn new(policy: Box<dyn ScalingPolicy>, config: &SchedulerConfig) -> Self {
        Self {
            policy,
            interval: config.scale_interval(),
            idle_grace: config.idle_grace(),
        }
    }

    /// Name of the active policy.
    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Evaluation interval.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn evaluate_once<T: ScalingTarget + ?Sized>(&self, target: &T) -> ScalingReport {
        let mut snapshot = target.snapshot();
        let mut reconciled = 0;
        if snapshot.total_workers < snapshot.min_workers {
            let missing = snapshot.min_workers - snapshot.total_workers;
            reconciled = target.grow(missing);
            if reconciled < missing {
                warn!(missing, reconciled, "could not restore minimum worker count");
            } else {
                info!(reconciled, "restored minimum worker count");
            }
            snapshot = target.snapshot();
        }

        let decision = self.policy.evaluate(&snapshot);
        let (mut created, mut removed) = (0, 0);
        match &decision {
            ScalingDecision::Hold => {
                debug!(
                    total = snapshot.total_workers,
                    busy = snapshot.busy_workers,
                    queued = snapshot.queue_length,
                    "scaling hold"
                );
            }
            ScalingDecision::ScaleUp { count, reason } => {
                let room = snapshot.max_workers.saturating_sub(snapshot.total_workers);
                created = target.grow((*count).min(room));
                info!(
                    policy = self.policy.name(),
                    requested = count,
                    created,
                    reason = %reason,
                    "scaled up"
                );
            }
            ScalingDecision::ScaleDown { count, reason } => {
                let surplus = snapshot.total_workers.saturating_sub(snapshot.min_workers);
                removed = target.shrink((*count).min(surplus), self.idle_grace);
                if removed > 0 {
                    info!(
                        policy = self.policy.name(),
                        requested = count,
                        removed,
                        reason = %reason,
                        "scaled down"
                    );
                } else {
                    debug!(reason = %reason, "no worker idle past the grace period");
                }
            }
        }

        ScalingReport {
            snapshot,
            decision,
            reconciled,
            created,
            removed,
        }
    }

    /// Evaluate every interval until the target stops or is dropped.
    pub(crate) async fn run<T: ScalingTarget + 'static>(self: Arc<Self>, target: Weak<T>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(target) = target.upgrade() else {
                break;
            };
            if target.is_stopped() {
                break;
            }
            self.evaluate_once(&*target);
        }
        debug!("scaling loop exited");
    }
}

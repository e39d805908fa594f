//! Scheduler configuration structure, defaults and validation.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable prefix read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "SCHEDULER_";

/// Construction-time configuration for a [`Scheduler`](crate::core::Scheduler).
///
/// Every field has a default and can be overridden independently, either with the
/// `with_*` builder methods, from JSON, or from `SCHEDULER_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Workers created at startup; the pool never shrinks below this while running.
    pub min_workers: usize,
    /// Hard upper bound on live workers.
    pub max_workers: usize,
    /// Maximum workers added or removed by one scaling decision.
    pub scale_step: usize,
    /// Utilization above which the pool grows (when tasks are waiting).
    pub upper_threshold: f64,
    /// Utilization below which idle workers are retired (when nothing is waiting).
    pub lower_threshold: f64,
    /// How long a worker must sit idle before it may be retired.
    pub idle_grace_ms: u64,
    /// Period of the scaling controller.
    pub scale_interval_ms: u64,
    /// Timeout applied to tasks that do not carry their own.
    pub default_task_timeout_ms: u64,
    /// Optional backlog bound; when set and the pool is at `max_workers`, submissions
    /// beyond this many queued tasks are rejected with `PoolExhausted`.
    pub max_backlog: Option<usize>,
    /// Stack size for each worker thread, in bytes.
    pub thread_stack_size: usize,
    /// Prefix for worker thread names.
    pub worker_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_workers: 2,
            max_workers: num_cpus::get().max(2),
            scale_step: 2,
            upper_threshold: 0.8,
            lower_threshold: 0.3,
            idle_grace_ms: 30_000,
            scale_interval_ms: 10_000,
            default_task_timeout_ms: 30_000,
            max_backlog: None,
            thread_stack_size: 2 * 1024 * 1024,
            worker_name_prefix: "sched-worker".into(),
        }
    }
}

impl SchedulerConfig {
    /// Configuration with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum worker count.
    #[must_use]
    pub const fn with_min_workers(mut self, n: usize) -> Self {
        self.min_workers = n;
        self
    }

    /// Set the maximum worker count.
    #[must_use]
    pub const fn with_max_workers(mut self, n: usize) -> Self {
        self.max_workers = n;
        self
    }

    /// Set the scaling step.
    #[must_use]
    pub const fn with_scale_step(mut self, n: usize) -> Self {
        self.scale_step = n;
        self
    }

    /// Set both utilization thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, lower: f64, upper: f64) -> Self {
        self.lower_threshold = lower;
        self.upper_threshold = upper;
        self
    }

    /// Set the idle grace period.
    #[must_use]
    pub const fn with_idle_grace(mut self, grace: Duration) -> Self {
        self.idle_grace_ms = as_millis(grace);
        self
    }

    /// Set the scaling interval.
    #[must_use]
    pub const fn with_scale_interval(mut self, interval: Duration) -> Self {
        self.scale_interval_ms = as_millis(interval);
        self
    }

    /// Set the default task timeout.
    #[must_use]
    pub const fn with_default_task_timeout(mut self, timeout: Duration) -> Self {
        self.default_task_timeout_ms = as_millis(timeout);
        self
    }

    /// Bound the backlog once the pool is fully scaled out.
    #[must_use]
    pub const fn with_max_backlog(mut self, backlog: usize) -> Self {
        self.max_backlog = Some(backlog);
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_worker_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.worker_name_prefix = prefix.into();
        self
    }

    /// Idle grace period as a `Duration`.
    #[must_use]
    pub const fn idle_grace(&self) -> Duration {
        Duration::from_millis(self.idle_grace_ms)
    }

    /// Scaling interval as a `Duration`.
    #[must_use]
    pub const fn scale_interval(&self) -> Duration {
        Duration::from_millis(self.scale_interval_ms)
    }

    /// Default task timeout as a `Duration`.
    #[must_use]
    pub const fn default_task_timeout(&self) -> Duration {
        Duration::from_millis(self.default_task_timeout_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".into());
        }
        if self.min_workers > self.max_workers {
            return Err(format!(
                "min_workers ({}) must not exceed max_workers ({})",
                self.min_workers, self.max_workers
            ));
        }
        if self.scale_step == 0 {
            return Err("scale_step must be greater than 0".into());
        }
        if !(0.0..=1.0).contains(&self.lower_threshold)
            || !(0.0..=1.0).contains(&self.upper_threshold)
        {
            return Err("thresholds must lie within [0, 1]".into());
        }
        if self.lower_threshold >= self.upper_threshold {
            return Err("lower_threshold must be below upper_threshold".into());
        }
        if self.scale_interval_ms == 0 {
            return Err("scale_interval_ms must be greater than 0".into());
        }
        if self.default_task_timeout_ms == 0 {
            return Err("default_task_timeout_ms must be greater than 0".into());
        }
        if self.max_backlog == Some(0) {
            return Err("max_backlog must be greater than 0 when set".into());
        }
        if self.thread_stack_size == 0 {
            return Err("thread_stack_size must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate it. Missing fields take
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the process environment, loading a `.env` file first
    /// if one exists. Recognised variables are `SCHEDULER_MIN_WORKERS`,
    /// `SCHEDULER_MAX_WORKERS`, `SCHEDULER_SCALE_STEP`, `SCHEDULER_UPPER_THRESHOLD`,
    /// `SCHEDULER_LOWER_THRESHOLD`, `SCHEDULER_IDLE_GRACE_MS`,
    /// `SCHEDULER_SCALE_INTERVAL_MS`, `SCHEDULER_DEFAULT_TASK_TIMEOUT_MS`,
    /// `SCHEDULER_MAX_BACKLOG`, `SCHEDULER_THREAD_STACK_SIZE` and
    /// `SCHEDULER_WORKER_NAME_PREFIX`.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or a validation error.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup using the same variable names
    /// as [`from_env`](Self::from_env).
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or a validation error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        override_from(&lookup, "MIN_WORKERS", &mut cfg.min_workers)?;
        override_from(&lookup, "MAX_WORKERS", &mut cfg.max_workers)?;
        override_from(&lookup, "SCALE_STEP", &mut cfg.scale_step)?;
        override_from(&lookup, "UPPER_THRESHOLD", &mut cfg.upper_threshold)?;
        override_from(&lookup, "LOWER_THRESHOLD", &mut cfg.lower_threshold)?;
        override_from(&lookup, "IDLE_GRACE_MS", &mut cfg.idle_grace_ms)?;
        override_from(&lookup, "SCALE_INTERVAL_MS", &mut cfg.scale_interval_ms)?;
        override_from(&lookup, "DEFAULT_TASK_TIMEOUT_MS", &mut cfg.default_task_timeout_ms)?;
        override_from(&lookup, "THREAD_STACK_SIZE", &mut cfg.thread_stack_size)?;
        if let Some(prefix) = lookup(&format!("{ENV_PREFIX}WORKER_NAME_PREFIX")) {
            cfg.worker_name_prefix = prefix;
        }
        let mut backlog = 0usize;
        if override_from(&lookup, "MAX_BACKLOG", &mut backlog)? {
            cfg.max_backlog = Some(backlog);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn override_from<F, T>(lookup: &F, suffix: &str, slot: &mut T) -> Result<bool, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{ENV_PREFIX}{suffix}");
    let Some(raw) = lookup(&key) else {
        return Ok(false);
    };
    *slot = raw
        .trim()
        .parse()
        .map_err(|e| format!("{key}: cannot parse `{raw}`: {e}"))?;
    Ok(true)
}

const fn as_millis(d: Duration) -> u64 {
    let ms = d.as_millis();
    if ms > u64::MAX as u128 {
        u64::MAX
    } else {
        ms as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = SchedulerConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.max_workers >= 2);
        assert_eq!(cfg.default_task_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_builder_methods() {
        let cfg = SchedulerConfig::new()
            .with_min_workers(1)
            .with_max_workers(8)
            .with_scale_step(3)
            .with_thresholds(0.2, 0.9)
            .with_idle_grace(Duration::from_secs(5))
            .with_scale_interval(Duration::from_millis(250))
            .with_max_backlog(64);
        assert_eq!(cfg.min_workers, 1);
        assert_eq!(cfg.max_workers, 8);
        assert_eq!(cfg.scale_step, 3);
        assert_eq!(cfg.idle_grace_ms, 5000);
        assert_eq!(cfg.scale_interval(), Duration::from_millis(250));
        assert_eq!(cfg.max_backlog, Some(64));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SCHEDULER_MIN_WORKERS", "3"),
            ("SCHEDULER_MAX_WORKERS", "12"),
            ("SCHEDULER_MAX_BACKLOG", "100"),
            ("SCHEDULER_WORKER_NAME_PREFIX", "opt"),
        ]
        .into_iter()
        .collect();
        let cfg = SchedulerConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(cfg.min_workers, 3);
        assert_eq!(cfg.max_workers, 12);
        assert_eq!(cfg.max_backlog, Some(100));
        assert_eq!(cfg.worker_name_prefix, "opt");
        assert_eq!(cfg.scale_step, 2);
    }

    #[test]
    fn test_lookup_parse_error_names_variable() {
        let err = SchedulerConfig::from_lookup(|k| {
            (k == "SCHEDULER_SCALE_STEP").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.contains("SCHEDULER_SCALE_STEP"));
    }
}

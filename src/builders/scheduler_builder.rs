//! Builder for [`Scheduler`] instances.

use tokio::runtime::Handle;

use crate::config::SchedulerConfig;
use crate::core::{
    AuditSink, Scheduler, SchedulerError, ScalingPolicy, ThresholdPolicy, WorkerExecutor,
};
use crate::runtime::TokioSpawner;

/// Assembles a scheduler from configuration plus optional collaborators.
///
/// ```rust,ignore
/// let audit = InMemoryAuditSink::new(1024);
/// let scheduler = SchedulerBuilder::new(SchedulerConfig::from_env()?)
///     .with_audit(audit.clone())
///     .with_runtime(runtime.handle().clone())
///     .start(MyExecutor)?;
/// ```
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    audit: Option<Box<dyn AuditSink>>,
    policy: Option<Box<dyn ScalingPolicy>>,
    runtime: Option<Handle>,
}

impl std::fmt::Debug for SchedulerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerBuilder")
            .field("config", &self.config)
            .field("audit", &self.audit.is_some())
            .field("policy", &self.policy.as_ref().map(|p| p.name().to_owned()))
            .field("runtime", &self.runtime.is_some())
            .finish()
    }
}

impl SchedulerBuilder {
    /// Start from a configuration. Validation happens in [`start`](Self::start).
    pub const fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            audit: None,
            policy: None,
            runtime: None,
        }
    }

    /// Record lifecycle events to `sink`.
    #[must_use]
    pub fn with_audit(mut self, sink: impl AuditSink + 'static) -> Self {
        self.audit = Some(Box::new(sink));
        self
    }

    /// Replace the default [`ThresholdPolicy`].
    #[must_use]
    pub fn with_policy(mut self, policy: impl ScalingPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    /// Spawn background activities on `handle` instead of the current runtime.
    #[must_use]
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Configuration being built.
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Validate the configuration, create `min_workers` workers and start the event
    /// and scaling loops.
    ///
    /// # Errors
    ///
    /// `InvalidConfig`, `NoRuntime` when no handle was given and the caller is not
    /// inside a tokio runtime, or `WorkerSpawn`.
    pub fn start<P, R, E>(self, executor: E) -> Result<Scheduler<P, R, E>, SchedulerError>
    where
        P: Send + 'static,
        R: Send + 'static,
        E: WorkerExecutor<P, R>,
    {
        self.config
            .validate()
            .map_err(SchedulerError::InvalidConfig)?;
        let spawner = match self.runtime {
            Some(handle) => TokioSpawner::new(handle),
            None => TokioSpawner::current()?,
        };
        let policy = self
            .policy
            .unwrap_or_else(|| Box::new(ThresholdPolicy::from_config(&self.config)));
        Scheduler::launch(self.config, executor, policy, self.audit, spawner)
    }
}

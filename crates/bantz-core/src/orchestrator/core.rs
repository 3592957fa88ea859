//! Orchestrator core structure
//!
//! Contains the `Orchestrator` struct and its builder methods. Process-wide
//! shared state (pre-router counters, breaker registry, job manager) is
//! constructed by the caller or here, and injected; nothing is global.

use crate::admission::PreRouter;
use crate::conversation::JobManager;
use crate::disambiguation::DisambiguationDialog;
use crate::error::Result;
use crate::executor::ToolExecutor;
use crate::finalize::FinalizerPipeline;
use crate::memory::ContextInjector;
use crate::router::IntentRouter;
use crate::security::ArgumentSanitizer;
use crate::trace::TraceLog;
use crate::utils::CircuitBreakerRegistry;
use crate::verifier::PlanVerifier;
use bantz_llm::SharedProvider;
use bantz_tools::{RunnerConfig, ToolRegistry, ToolRunner};
use std::sync::Arc;
use tracing::info;

use super::config::OrchestratorConfig;
use super::session::SessionHandle;

/// Runs turns through every pipeline stage
pub struct Orchestrator {
    pub(crate) pre_router: Arc<PreRouter>,
    pub(crate) router: IntentRouter,
    pub(crate) verifier: PlanVerifier,
    pub(crate) executor: ToolExecutor,
    pub(crate) disambiguation: DisambiguationDialog,
    pub(crate) finalizer: FinalizerPipeline,
    pub(crate) injector: ContextInjector,
    pub(crate) trace_log: Option<TraceLog>,
    pub(crate) jobs: Arc<JobManager>,
    pub(crate) config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator
    ///
    /// The fast provider routes intents and writes fast-tier replies; the
    /// quality provider, when present, writes quality-tier replies.
    pub fn new(
        fast: SharedProvider,
        quality: Option<SharedProvider>,
        registry: Arc<ToolRegistry>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        config.validate()?;

        let runner = ToolRunner::new(
            registry,
            RunnerConfig::new(config.executor.step_timeout()),
        );
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.breaker.to_config()));
        let executor = ToolExecutor::new(
            runner,
            breakers,
            ArgumentSanitizer::new(config.sanitizer.clone()),
            config.executor.clone(),
        );
        let router =
            IntentRouter::new(Arc::clone(&fast), config.router.clone()).with_catalog(executor.catalog());

        info!(
            tools = executor.catalog().len(),
            fast = %fast.default_model(),
            quality = quality.as_ref().map_or("-", |q| q.default_model()),
            "Orchestrator ready"
        );

        Ok(Self {
            pre_router: Arc::new(PreRouter::with_default_rules()?),
            router,
            verifier: PlanVerifier::new(config.verifier.clone()),
            executor,
            disambiguation: DisambiguationDialog::new(config.disambiguation.clone()),
            finalizer: FinalizerPipeline::new(fast, quality, config.finalizer.clone()),
            injector: ContextInjector::new(config.memory.clone()),
            trace_log: None,
            jobs: Arc::new(JobManager::new(config.jobs.clone())),
            config,
        })
    }

    /// Share a pre-router (and its counters) with other orchestrators
    #[must_use]
    pub fn with_pre_router(mut self, pre_router: Arc<PreRouter>) -> Self {
        self.pre_router = pre_router;
        self
    }

    /// Share a breaker registry with other orchestrators
    #[must_use]
    pub fn with_breakers(mut self, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        self.executor = ToolExecutor::new(
            self.executor.runner().clone(),
            breakers,
            ArgumentSanitizer::new(self.config.sanitizer.clone()),
            self.config.executor.clone(),
        );
        self
    }

    /// Share a job manager with the conversation driver
    #[must_use]
    pub fn with_jobs(mut self, jobs: Arc<JobManager>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Append one record per turn to this log
    #[must_use]
    pub fn with_trace_log(mut self, log: TraceLog) -> Self {
        self.trace_log = Some(log);
        self
    }

    /// Start a session
    #[must_use]
    pub fn session(self: &Arc<Self>) -> SessionHandle {
        SessionHandle::new(Arc::clone(self))
    }

    /// Get the pre-router
    #[must_use]
    pub fn pre_router(&self) -> &Arc<PreRouter> {
        &self.pre_router
    }

    /// Get the breaker registry
    #[must_use]
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        self.executor.breakers()
    }

    /// Get the job manager
    #[must_use]
    pub fn jobs(&self) -> &Arc<JobManager> {
        &self.jobs
    }

    /// Get the intent router
    #[must_use]
    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}

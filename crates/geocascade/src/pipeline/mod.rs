//! Sequential, guarded stage execution.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. For each stage the guard is evaluated
//! against the context as it stands at that moment; a false guard skips the stage, a true
//! guard runs its effect to completion before the next guard is looked at. Stages never
//! overlap.
//!
//! Effects report expected failures by pushing onto `ctx.errors` themselves. Anything that
//! escapes an effect, an `Err` or a panic, is caught here, recorded as an error entry, and
//! the pipeline moves on to the next stage.

use std::{any::Any, fmt, future::Future, panic::AssertUnwindSafe, sync::Arc, time::Instant};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error, info, instrument, warn};

pub use error::{PipelineError, StageError};

use crate::{context::RequestContext, predicates::Predicate};

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum StageError {
        #[error(transparent)]
        Service(#[from] geocascade_services::ServiceError),
        #[error("{0}")]
        Message(String),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }

    #[derive(Error, Debug)]
    pub enum PipelineError {
        #[error("Request cancelled before the pipeline completed")]
        Cancelled,
    }
}

/// The work a stage performs once its guard passes.
#[async_trait]
pub trait StageEffect: Send + Sync {
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError>;
}

/// Adapter for effects that never await.
struct SyncEffect<F>(F);

#[async_trait]
impl<F> StageEffect for SyncEffect<F>
where
    F: Fn(&mut RequestContext) + Send + Sync,
{
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
        (self.0)(ctx);
        Ok(())
    }
}

#[derive(Clone)]
pub struct Stage {
    name: &'static str,
    guard: Predicate,
    effect: Arc<dyn StageEffect>,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("guard", &self.guard.to_string())
            .finish_non_exhaustive()
    }
}

impl Stage {
    /// An always-run stage.
    pub fn new(name: &'static str, effect: impl StageEffect + 'static) -> Self {
        Self {
            name,
            guard: Predicate::Always,
            effect: Arc::new(effect),
        }
    }

    /// An always-run stage from a synchronous function.
    pub fn sync<F>(name: &'static str, f: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        Self::new(name, SyncEffect(f))
    }

    pub fn when(mut self, guard: Predicate) -> Self {
        self.guard = guard;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn guard(&self) -> &Predicate {
        &self.guard
    }
}

/// What happened to each stage during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    pub executed: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
    /// Stages whose effect returned an error or panicked. Also listed in `executed`.
    pub failed: Vec<&'static str>,
}

impl Trace {
    pub fn ran(&self, stage: &str) -> bool {
        self.executed.iter().any(|s| *s == stage)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    name: &'static str,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stages: Vec::new(),
        }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn find(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    #[instrument(name = "Pipeline", level = "info", skip_all, fields(route = self.name))]
    pub async fn run(&self, ctx: &mut RequestContext) -> Trace {
        let t_start = Instant::now();
        let mut trace = Trace::default();

        for stage in &self.stages {
            if !stage.guard.eval(ctx) {
                debug!(stage = stage.name, guard = %stage.guard, "Skipping stage");
                trace.skipped.push(stage.name);
                continue;
            }

            let t_stage = Instant::now();
            trace.executed.push(stage.name);
            match AssertUnwindSafe(stage.effect.apply(ctx)).catch_unwind().await {
                Ok(Ok(())) => {
                    debug!(
                        stage = stage.name,
                        results = ctx.data.len(),
                        elapsed_ms = ?t_stage.elapsed(),
                        "Stage complete"
                    );
                }
                Ok(Err(e)) => {
                    warn!(stage = stage.name, error = %e, "Stage failed");
                    ctx.push_error(e.to_string());
                    trace.failed.push(stage.name);
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(stage = stage.name, panic = %message, "Stage panicked");
                    ctx.push_error(format!("{} failed: {message}", stage.name));
                    trace.failed.push(stage.name);
                }
            }
        }

        info!(
            executed = trace.executed.len(),
            skipped = trace.skipped.len(),
            errors = ctx.errors.len(),
            results = ctx.data.len(),
            elapsed_ms = ?t_start.elapsed(),
            "Pipeline complete"
        );
        trace
    }

    /// Run until `cancel` resolves. On cancellation the in-flight stage is dropped and no
    /// further stages start.
    pub async fn run_until_cancelled<C>(
        &self,
        ctx: &mut RequestContext,
        cancel: C,
    ) -> Result<Trace, PipelineError>
    where
        C: Future<Output = ()> + Send,
    {
        tokio::select! {
            biased;
            () = cancel => {
                warn!(route = self.name, "Pipeline cancelled");
                Err(PipelineError::Cancelled)
            }
            trace = self.run(ctx) => Ok(trace),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use geocascade_services::MatchRecord;

    use super::*;
    use crate::{
        context::Clean,
        predicates::{has_response_data, not},
    };

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl StageEffect for Counting {
        async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            ctx.data.push(MatchRecord::new("osm", "venue", "1"));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl StageEffect for Failing {
        async fn apply(&self, _ctx: &mut RequestContext) -> Result<(), StageError> {
            Err(StageError::Message("backend unreachable".to_string()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl StageEffect for Panicking {
        async fn apply(&self, _ctx: &mut RequestContext) -> Result<(), StageError> {
            panic!("boom");
        }
    }

    struct Sleeping;

    #[async_trait]
    impl StageEffect for Sleeping {
        async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            ctx.push_warning("should never get here");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_guards_see_earlier_mutations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new("test")
            .stage(Stage::new("first", Counting(calls.clone())).when(not(has_response_data())))
            .stage(Stage::new("second", Counting(calls.clone())).when(not(has_response_data())));

        let mut ctx = RequestContext::new(Clean::new(10));
        let trace = pipeline.run(&mut ctx).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(trace.executed, vec!["first"]);
        assert_eq!(trace.skipped, vec!["second"]);
    }

    #[tokio::test]
    async fn test_errors_are_recorded_and_execution_continues() {
        let pipeline = Pipeline::new("test")
            .stage(Stage::new("failing", Failing))
            .stage(Stage::new("panicking", Panicking))
            .stage(Stage::sync("tail", |ctx| ctx.push_warning("tail ran")));

        let mut ctx = RequestContext::new(Clean::new(10));
        let trace = pipeline.run(&mut ctx).await;

        assert_eq!(trace.failed, vec!["failing", "panicking"]);
        assert_eq!(ctx.errors.len(), 2);
        assert_eq!(ctx.errors[0], "backend unreachable");
        assert!(ctx.errors[1].contains("boom"), "got {:?}", ctx.errors);
        assert_eq!(ctx.warnings, vec!["tail ran"]);
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_pipeline() {
        let pipeline = Pipeline::new("test")
            .stage(Stage::new("slow", Sleeping))
            .stage(Stage::sync("tail", |ctx| ctx.push_warning("tail ran")));

        let mut ctx = RequestContext::new(Clean::new(10));
        let result = pipeline
            .run_until_cancelled(&mut ctx, tokio::time::sleep(Duration::from_millis(10)))
            .await;

        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert!(ctx.warnings.is_empty(), "no stage after cancellation may run");
    }
}

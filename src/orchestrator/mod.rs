// src/orchestrator/mod.rs
//! ETL orchestrator: drives the two-turn tool-calling conversation.
//!
//! Extract: the model must ask for `fetch_news`; we aggregate the persisted
//! sources locally and hand the items back as a tool response.
//! Transform: the model must answer with one `post_message` call carrying the
//! candidate text.
//! Load: publish, either straight away (scheduled runs) or after a human has
//! approved/edited the draft (`post_summary`).
//!
//! Every run owns its `PhaseMachine` and history; the orchestrator itself only
//! holds shared, immutable collaborators.

pub mod phase;
pub mod tools;

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::PromptOverrides;
use crate::ingest::types::NewsItem;
use crate::ingest::{FeedAggregator, FeedFetchError};
use crate::notify::{Ack, DeliveryError, DynPublisher};
use crate::reasoning::{
    ConverseRequest, DynReasoningClient, ServiceReply, ServiceUnavailable, ToolInvocation,
    ToolSchema, Turn,
};
use crate::schedule::ScheduledJob;
use crate::store::Db;

pub use phase::{IllegalTransition, Phase, PhaseMachine};
pub use tools::{FETCH_TOOL, PUBLISH_TOOL};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Expected a single call to '{expected}', got {found}")]
    UnexpectedToolCall {
        expected: &'static str,
        found: String,
    },
    #[error("The 'post_message' call did not carry a non-empty 'message' argument")]
    MissingPublishArgument,
    #[error(transparent)]
    FeedFetch(#[from] FeedFetchError),
    #[error(transparent)]
    ServiceUnavailable(#[from] ServiceUnavailable),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("failed to read pipeline configuration: {0:#}")]
    Store(anyhow::Error),
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

/// What the model asked to fetch, and what we fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractArtifact {
    pub invocation: ToolInvocation,
    pub news: Vec<NewsItem>,
}

/// The candidate message (`description`) and the call that carried it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformArtifact {
    pub description: String,
    pub invocation: ToolInvocation,
}

/// Interactive result, paused at the publish checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryDraft {
    pub extract: ExtractArtifact,
    pub transform: TransformArtifact,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub extracted: Vec<NewsItem>,
    pub transformed: TransformArtifact,
    pub published: String,
    #[serde(skip)]
    pub trail: Vec<Phase>,
}

/// A failed run, with whatever it produced before failing.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: PipelineError,
    pub failed_in: Phase,
    pub extracted: Option<Vec<NewsItem>>,
    pub transformed: Option<TransformArtifact>,
    pub trail: Vec<Phase>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Interactive,
    Scheduled,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Interactive => "interactive",
            Mode::Scheduled => "scheduled",
        }
    }
}

/// State private to one pipeline run.
struct Run {
    mode: Mode,
    phases: PhaseMachine,
    history: Vec<Turn>,
    extracted: Option<Vec<NewsItem>>,
    transformed: Option<TransformArtifact>,
    started: Instant,
}

impl Run {
    fn new(mode: Mode) -> Self {
        counter!("etl_runs_total", "mode" => mode.as_str()).increment(1);
        Self {
            mode,
            phases: PhaseMachine::new(),
            history: Vec::new(),
            extracted: None,
            transformed: None,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: Phase) -> Result<(), PipelineError> {
        self.phases.advance(next).map_err(PipelineError::from)
    }

    fn into_failure(mut self, error: PipelineError) -> RunFailure {
        let failed_in = self.phases.fail();
        counter!("etl_run_failures_total", "phase" => failed_in.as_str()).increment(1);
        histogram!("etl_run_ms").record(self.started.elapsed().as_secs_f64() * 1_000.0);
        warn!(
            target: "etl",
            mode = self.mode.as_str(),
            phase = failed_in.as_str(),
            error = %error,
            "pipeline run failed"
        );
        RunFailure {
            error,
            failed_in,
            extracted: self.extracted,
            transformed: self.transformed,
            trail: self.phases.trail().to_vec(),
        }
    }
}

struct Prompts {
    system_instruction: String,
    user_prompt: String,
}

pub struct Orchestrator {
    reasoning: DynReasoningClient,
    aggregator: FeedAggregator,
    publisher: DynPublisher,
    db: Arc<Db>,
    tools: Vec<ToolSchema>,
    prompts: Prompts,
    reasoning_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        reasoning: DynReasoningClient,
        aggregator: FeedAggregator,
        publisher: DynPublisher,
        db: Arc<Db>,
    ) -> Self {
        Self {
            reasoning,
            aggregator,
            publisher,
            db,
            tools: tools::tool_schemas(),
            prompts: Prompts {
                system_instruction: tools::SYSTEM_INSTRUCTION.to_string(),
                user_prompt: tools::USER_PROMPT.to_string(),
            },
            reasoning_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_prompts(mut self, overrides: &PromptOverrides) -> Self {
        if let Some(s) = overrides.system_instruction.as_deref().filter(|s| !s.trim().is_empty()) {
            self.prompts.system_instruction = s.to_string();
        }
        if let Some(s) = overrides.user_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            self.prompts.user_prompt = s.to_string();
        }
        self
    }

    pub fn with_reasoning_timeout(mut self, timeout: Duration) -> Self {
        self.reasoning_timeout = timeout;
        self
    }

    /// Extract + Transform, stopping at the publish checkpoint. Calling this
    /// again is a regenerate: a fresh run from `Idle`, nothing reused.
    pub async fn generate_summary(&self) -> Result<SummaryDraft, RunFailure> {
        let mut run = Run::new(Mode::Interactive);
        match self.drive_to_checkpoint(&mut run).await {
            Ok(draft) => {
                info!(
                    target: "etl",
                    items = draft.extract.news.len(),
                    chars = draft.transform.description.chars().count(),
                    "summary ready for review"
                );
                Ok(draft)
            }
            Err(e) => Err(run.into_failure(e)),
        }
    }

    /// Load step for a human-approved (possibly edited) message.
    pub async fn post_summary(&self, message: &str) -> Result<Ack, PipelineError> {
        if message.trim().is_empty() {
            return Err(PipelineError::MissingPublishArgument);
        }
        let ack = self.publisher.publish(message).await?;
        info!(target: "etl", ack = %ack, "reviewed summary published");
        Ok(ack)
    }

    /// All phases, no human checkpoint. Used by the scheduler.
    pub async fn run_full_process(&self) -> Result<PipelineResult, RunFailure> {
        let mut run = Run::new(Mode::Scheduled);
        match self.drive_to_done(&mut run).await {
            Ok(result) => {
                histogram!("etl_run_ms").record(run.started.elapsed().as_secs_f64() * 1_000.0);
                info!(
                    target: "etl",
                    items = result.extracted.len(),
                    published = %result.published,
                    "pipeline run completed"
                );
                Ok(result)
            }
            Err(e) => Err(run.into_failure(e)),
        }
    }

    async fn drive_to_done(&self, run: &mut Run) -> Result<PipelineResult, PipelineError> {
        let draft = self.drive_to_checkpoint(run).await?;
        // Scheduled runs take the candidate verbatim.
        run.advance(Phase::Publishing)?;
        let ack = self.publisher.publish(&draft.transform.description).await?;
        run.advance(Phase::Done)?;
        Ok(PipelineResult {
            extracted: draft.extract.news,
            transformed: draft.transform,
            published: ack.to_string(),
            trail: run.phases.trail().to_vec(),
        })
    }

    async fn drive_to_checkpoint(&self, run: &mut Run) -> Result<SummaryDraft, PipelineError> {
        run.advance(Phase::ExtractRequested)?;
        run.history.push(Turn::User(self.prompts.user_prompt.clone()));
        let reply = self.converse(&run.history).await?;
        let (fetch_call, request) = tools::expect_fetch(&reply)?;
        tracing::debug!(
            target: "etl",
            category = ?request.category,
            limit = ?request.limit,
            "fetch requested; using persisted sources"
        );

        run.advance(Phase::Extracting)?;
        let sources = self.db.sources().await.map_err(PipelineError::Store)?;
        let news = self.aggregator.fetch_all(&sources).await?;
        info!(target: "etl", sources = sources.len(), items = news.len(), "extract complete");
        run.extracted = Some(news.clone());

        run.advance(Phase::TransformRequested)?;
        run.history.push(Turn::ToolCall(fetch_call.clone()));
        run.history.push(Turn::ToolResponse {
            name: FETCH_TOOL.to_string(),
            response: json!({ "news": news }),
        });
        let reply = self.converse(&run.history).await?;
        let (publish_call, message) = tools::expect_publish(&reply)?;
        let transform = TransformArtifact {
            description: message,
            invocation: publish_call,
        };
        run.transformed = Some(transform.clone());

        run.advance(Phase::AwaitingPublishDecision)?;
        Ok(SummaryDraft {
            extract: ExtractArtifact {
                invocation: fetch_call,
                news,
            },
            transform,
        })
    }

    async fn converse(&self, history: &[Turn]) -> Result<ServiceReply, PipelineError> {
        let req = ConverseRequest {
            system_instruction: &self.prompts.system_instruction,
            history,
            tools: &self.tools,
        };
        match tokio::time::timeout(self.reasoning_timeout, self.reasoning.converse(req)).await {
            Ok(reply) => Ok(reply?),
            Err(_) => Err(ServiceUnavailable(format!(
                "{} did not reply within {:?}",
                self.reasoning.provider_name(),
                self.reasoning_timeout
            ))
            .into()),
        }
    }
}

#[async_trait::async_trait]
impl ScheduledJob for Orchestrator {
    async fn run_scheduled(&self) -> anyhow::Result<()> {
        match self.run_full_process().await {
            Ok(_) => Ok(()),
            Err(f) => Err(anyhow::anyhow!(
                "{} (failed in {})",
                f.error,
                f.failed_in.as_str()
            )),
        }
    }
}

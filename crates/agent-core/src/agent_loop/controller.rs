//! Agent loop controller.
//!
//! Opens a conversation with the runtime, folds its event stream into a
//! [`RunBookkeeping`], and turns the outcome into an [`AgentRunResult`]. Rate-limit
//! rejections are retried on a fresh session after the suggested delay.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::bookkeeping::{RunBookkeeping, NO_DONE_ERROR};
use super::config::AgentLoopConfig;
use super::runtime::{ConversationRuntime, ConversationSession, SessionRequest, ToolHandler};
use super::types::{AgentLoopStatus, AgentRunResult};
use crate::errors::AgentError;

const CANCELLED_ERROR: &str = "run cancelled";
const CANCELLED_WHILE_WAITING_ERROR: &str = "context cancelled while waiting for rate limit";

/// How one session ended.
#[derive(Debug)]
enum SessionOutcome {
    /// The run is over; `Some` carries the failure that ended it.
    Finished(Option<String>),
    RateLimited { delay: Duration, message: String },
}

/// Drives one task at a time through the conversation runtime.
pub struct AgentLoopController {
    config: AgentLoopConfig,
    runtime: Arc<dyn ConversationRuntime>,
    handler: Arc<dyn ToolHandler>,
    status: Mutex<AgentLoopStatus>,
}

impl std::fmt::Debug for AgentLoopController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoopController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AgentLoopController {
    pub fn new(
        config: AgentLoopConfig,
        runtime: Arc<dyn ConversationRuntime>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            config,
            runtime,
            handler,
            status: Mutex::new(AgentLoopStatus::Idle),
        }
    }

    pub fn config(&self) -> &AgentLoopConfig {
        &self.config
    }

    pub async fn status(&self) -> AgentLoopStatus {
        *self.status.lock().await
    }

    async fn set_status(&self, status: AgentLoopStatus) {
        *self.status.lock().await = status;
    }

    /// Runs `prompt` to completion.
    ///
    /// Task failures (no `done`, iteration limit, transport errors, cancellation) are
    /// reported inside the returned result; only a session that cannot be opened is an
    /// `Err`.
    pub async fn run(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentRunResult, AgentError> {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut retries: u32 = 0;

        self.set_status(AgentLoopStatus::Running).await;
        info!(target: "agent-loop", max_iterations = self.config.max_iterations, "run started");

        loop {
            attempts += 1;
            let mut book = RunBookkeeping::new(prompt);

            let request = SessionRequest {
                prompt: prompt.to_string(),
                tools: self.handler.declarations(),
                handler: Arc::clone(&self.handler),
            };
            let mut session = match self.runtime.open_session(request).await {
                Ok(session) => session,
                Err(err) => {
                    self.set_status(AgentLoopStatus::Failed).await;
                    warn!(target: "agent-loop", %err, "failed to open session");
                    return Err(AgentError::session(err.message));
                }
            };

            match self.drive(session.as_mut(), &mut book, cancel).await {
                SessionOutcome::Finished(failure) => {
                    return Ok(self.finish(book, failure, attempts, started).await);
                }
                SessionOutcome::RateLimited { delay, message } => {
                    if retries >= self.config.max_rate_limit_retries {
                        let failure = format!(
                            "rate limit retries exhausted after {attempts} attempts: {message}"
                        );
                        return Ok(self.finish(book, Some(failure), attempts, started).await);
                    }
                    retries += 1;

                    let wait = delay + self.config.rate_limit_buffer();
                    self.set_status(AgentLoopStatus::RateLimited).await;
                    warn!(
                        target: "agent-loop",
                        retry = retries,
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, retrying with a fresh session"
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            let failure = CANCELLED_WHILE_WAITING_ERROR.to_string();
                            return Ok(self.finish(book, Some(failure), attempts, started).await);
                        }
                        _ = tokio::time::sleep(wait) => {}
                    }
                    self.set_status(AgentLoopStatus::Running).await;
                }
            }
        }
    }

    async fn drive(
        &self,
        session: &mut dyn ConversationSession,
        book: &mut RunBookkeeping,
        cancel: &CancellationToken,
    ) -> SessionOutcome {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    if book.done_called() || book.takeover_requested() {
                        return SessionOutcome::Finished(None);
                    }
                    return SessionOutcome::Finished(Some(CANCELLED_ERROR.to_string()));
                }
                next = session.next_event() => next,
            };

            match next {
                None => return SessionOutcome::Finished(None),
                Some(Ok(event)) => {
                    book.absorb(&event);
                    if !book.done_called() && book.tool_calls() > self.config.max_iterations {
                        return SessionOutcome::Finished(Some(format!(
                            "maximum iterations ({}) reached",
                            self.config.max_iterations
                        )));
                    }
                }
                Some(Err(err)) => {
                    if book.completed_successfully() {
                        debug!(target: "agent-loop", %err, "ignoring error after done");
                        continue;
                    }
                    if book.takeover_requested() {
                        return SessionOutcome::Finished(None);
                    }
                    if err.message.contains("empty response")
                        && !book.done_called()
                        && !book.steps().is_empty()
                    {
                        return SessionOutcome::Finished(Some(NO_DONE_ERROR.to_string()));
                    }
                    if let Some(delay) = err.rate_limit_delay() {
                        return SessionOutcome::RateLimited {
                            delay,
                            message: err.message,
                        };
                    }
                    return SessionOutcome::Finished(Some(err.message));
                }
            }
        }
    }

    async fn finish(
        &self,
        book: RunBookkeeping,
        failure: Option<String>,
        attempts: u32,
        started: Instant,
    ) -> AgentRunResult {
        let result = book.finish(failure, attempts, started.elapsed());
        self.set_status(result.status).await;
        info!(
            target: "agent-loop",
            success = result.success,
            status = ?result.status,
            steps = result.steps.len(),
            tokens = result.tokens_used,
            attempts,
            error = result.error.as_deref().unwrap_or(""),
            "run finished"
        );
        result
    }
}

//! The `Agent` facade: one browser, one toolset, one orchestration loop.

use std::sync::Arc;

use action_primitives::{
    ActionPrimitives, AnnotationConfig, DefaultActionPrimitives, DefaultWaitStrategy, ExecCtx,
};
use agent_core::{
    AgentError, AgentLoopController, AgentLoopStatus, AgentRunResult, BrowserToolset,
    ConversationRuntime,
};
use anyhow::{anyhow, bail, Context, Result};
use cdp_adapter::{event_bus, Cdp, CdpAdapter, CdpTransport};
use perceiver_structural::ElementMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::BuaConfig;

const EVENT_BUFFER: usize = 256;

#[derive(Clone)]
struct Session {
    adapter: Arc<CdpAdapter>,
    primitives: Arc<DefaultActionPrimitives>,
    controller: Arc<AgentLoopController>,
}

#[derive(Default)]
struct State {
    session: Option<Session>,
    closed: bool,
}

pub struct Agent {
    config: BuaConfig,
    runtime: Arc<dyn ConversationRuntime>,
    transport: Option<Arc<dyn CdpTransport>>,
    state: Mutex<State>,
    shutdown: CancellationToken,
    current_run: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Nothing is launched until [`Agent::start`].
    pub fn new(config: BuaConfig, runtime: Arc<dyn ConversationRuntime>) -> Self {
        Self {
            config,
            runtime,
            transport: None,
            state: Mutex::new(State::default()),
            shutdown: CancellationToken::new(),
            current_run: Mutex::new(None),
        }
    }

    /// Uses `transport` instead of launching or attaching to Chrome.
    pub fn with_transport(
        config: BuaConfig,
        runtime: Arc<dyn ConversationRuntime>,
        transport: Arc<dyn CdpTransport>,
    ) -> Self {
        Self {
            transport: Some(transport),
            ..Self::new(config, runtime)
        }
    }

    pub fn config(&self) -> &BuaConfig {
        &self.config
    }

    /// Starts the browser and wires the toolset to the loop. Calling it again is a no-op.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            bail!("agent is closed");
        }
        if state.session.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        // the primitives subscribe their own receiver when the adapter starts
        let (bus, _) = event_bus(EVENT_BUFFER);
        let cdp_config = self.config.cdp_config();
        let adapter = Arc::new(match &self.transport {
            Some(transport) => CdpAdapter::with_transport(cdp_config, bus, Arc::clone(transport)),
            None => CdpAdapter::new(cdp_config, bus),
        });

        let primitives = Arc::new(DefaultActionPrimitives::new(
            Arc::clone(&adapter),
            Arc::new(DefaultWaitStrategy),
            self.config.primitives_config(),
        ));
        primitives
            .ensure_adapter_ready()
            .await
            .context("Failed to start browser")?;

        let toolset = BrowserToolset::new(
            primitives.clone() as Arc<dyn ActionPrimitives>,
            self.config.toolset_config(),
        )
        .with_cancel_token(self.shutdown.child_token());
        let controller = AgentLoopController::new(
            self.config.loop_config(),
            Arc::clone(&self.runtime),
            Arc::new(toolset),
        );

        info!(
            headless = self.config.browser.headless,
            viewport = ?self.config.viewport(),
            "agent started"
        );
        state.session = Some(Session {
            adapter,
            primitives,
            controller: Arc::new(controller),
        });
        Ok(())
    }

    async fn session(&self) -> Result<Session> {
        let state = self.state.lock().await;
        if state.closed {
            bail!("agent is closed");
        }
        state
            .session
            .clone()
            .ok_or_else(|| anyhow!("agent not started, call start() first"))
    }

    fn ctx(&self) -> ExecCtx {
        ExecCtx::new(self.shutdown.child_token())
    }

    /// Runs one task. Task failures are reported in the result, not as `Err`.
    ///
    /// Only one task runs at a time; a second call while one is in flight fails with
    /// [`AgentError::Busy`].
    pub async fn run(&self, prompt: &str) -> Result<AgentRunResult> {
        let session = self.session().await?;
        let token = {
            let mut current = self.current_run.lock().await;
            if current.is_some() {
                return Err(AgentError::Busy.into());
            }
            let token = self.shutdown.child_token();
            *current = Some(token.clone());
            token
        };

        let outcome = session.controller.run(prompt, &token).await;
        self.current_run.lock().await.take();
        Ok(outcome?)
    }

    /// Cancels the run in progress, if any.
    pub async fn cancel(&self) {
        if let Some(token) = self.current_run.lock().await.as_ref() {
            token.cancel();
        }
    }

    pub async fn status(&self) -> AgentLoopStatus {
        let session = self.state.lock().await.session.clone();
        match session {
            Some(session) => session.controller.status().await,
            None => AgentLoopStatus::Idle,
        }
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        let session = self.session().await?;
        session
            .primitives
            .navigate(&self.ctx(), url)
            .await
            .with_context(|| format!("Failed to navigate to {url}"))?;
        Ok(())
    }

    /// Raw PNG of the active tab.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let session = self.session().await?;
        Ok(session.primitives.screenshot(&self.ctx()).await?)
    }

    pub async fn element_map(&self) -> Result<ElementMap> {
        let session = self.session().await?;
        Ok(session.primitives.element_map(&self.ctx()).await?)
    }

    pub async fn show_annotations(&self) -> Result<usize> {
        self.show_annotations_with(&self.config.agent.annotation).await
    }

    pub async fn show_annotations_with(&self, config: &AnnotationConfig) -> Result<usize> {
        let session = self.session().await?;
        Ok(session
            .primitives
            .show_annotations(&self.ctx(), config)
            .await?)
    }

    pub async fn hide_annotations(&self) -> Result<()> {
        let session = self.session().await?;
        Ok(session.primitives.hide_annotations(&self.ctx()).await?)
    }

    /// Shows the overlay if it is hidden, hides it otherwise. Returns whether it is now shown.
    pub async fn toggle_annotations(&self) -> Result<bool> {
        let session = self.session().await?;
        Ok(session
            .primitives
            .toggle_annotations(&self.ctx(), &self.config.agent.annotation)
            .await?)
    }

    /// Sends a raw CDP command to the active tab and returns its result.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let session = self.session().await?;
        let page = session
            .primitives
            .tabs()
            .active_page()
            .await
            .ok_or_else(|| anyhow!("no active page"))?;
        session
            .adapter
            .call(page, method, params)
            .await
            .with_context(|| format!("{method} failed"))
    }

    /// Cancels any run, closes every tab and stops the browser. Safe to call twice.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        self.shutdown.cancel();

        if let Some(session) = state.session.take() {
            session.primitives.close().await;
            session.adapter.shutdown().await;
            info!("agent closed");
        } else {
            warn!("agent closed before it was started");
        }
        Ok(())
    }
}

use crate::config::Config;
use crate::context::{render_context, render_prompt};
use crate::error::{ArchaeologistError, Result as ArchaeologistResult};
use crate::pipeline::{BuildControl, BuildProgress, RepositorySource};
use crate::session::Session;
use crate::types::*;

use anyhow::{Context, Result};
use rmcp::{
    ErrorData as McpError, Peer, RoleServer, ServerHandler, ServiceExt,
    handler::server::{router::prompt::PromptRouter, tool::ToolRouter, wrapper::Parameters},
    model::*,
    prompt, prompt_handler, prompt_router, tool, tool_handler, tool_router,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ArchaeologistMcpServer {
    session: Arc<Session>,
    shutdown: CancellationToken,
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
}

impl ArchaeologistMcpServer {
    /// Open a session from `config` and wrap it in a server
    pub async fn new(config: Config) -> Result<Self> {
        let session = Session::open(config)
            .await
            .context("Failed to open session")?;
        Ok(Self::with_session(Arc::new(session)))
    }

    /// Create a server around an existing session
    pub fn with_session(session: Arc<Session>) -> Self {
        Self {
            session,
            shutdown: CancellationToken::new(),
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Cancelled on shutdown; in-flight builds stop after their current batch
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Resolve the request's source (cloning if needed) and rebuild the index
    pub async fn do_analyze(
        &self,
        req: AnalyzeRequest,
        peer: Option<Peer<RoleServer>>,
        progress_token: Option<ProgressToken>,
    ) -> ArchaeologistResult<AnalyzeResponse> {
        req.validate()?;
        let start = Instant::now();

        let url = req.url.as_deref().map(str::trim).filter(|u| !u.is_empty());
        let path = match url {
            Some(url) => {
                notify(&peer, &progress_token, 0.0, None, format!("Cloning {}...", url)).await;
                self.session.clone_repository(url, None).await?
            }
            None => PathBuf::from(req.path.as_deref().unwrap_or_default().trim()),
        };

        let branch = req
            .branch
            .clone()
            .unwrap_or_else(|| self.session.config().extraction.branch.clone());
        let options = self.session.extraction_options(req.commit_limit)?;

        let (progress_tx, forwarder) = match (&peer, &progress_token) {
            (Some(peer), Some(token)) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let handle = tokio::spawn(forward_progress(peer.clone(), token.clone(), rx));
                (Some(tx), Some(handle))
            }
            _ => (None, None),
        };

        let control = BuildControl {
            progress: progress_tx,
            cancel: self.shutdown.child_token(),
        };

        let result = self
            .session
            .analyze(&RepositorySource::new(path, branch), &options, control)
            .await;

        if let Some(handle) = forwarder {
            let _ = handle.await;
        }
        let report = result?;

        Ok(AnalyzeResponse {
            repository: report.repository.display().to_string(),
            branch: report.branch,
            commits_indexed: report.commits_indexed,
            batches: report.batches,
            model: self.session.model_name().to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    pub async fn do_search(
        &self,
        req: SearchHistoryRequest,
    ) -> ArchaeologistResult<SearchHistoryResponse> {
        req.validate()?;
        let start = Instant::now();
        let results = self
            .session
            .search(&req.query, req.limit, req.min_score)
            .await?;
        Ok(SearchHistoryResponse {
            results,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    pub async fn do_build_prompt(
        &self,
        req: BuildPromptRequest,
    ) -> ArchaeologistResult<BuildPromptResponse> {
        req.validate()?;
        let hits = self
            .session
            .search(&req.question, req.limit, req.min_score)
            .await?;
        let context = render_context(&hits);
        Ok(BuildPromptResponse {
            prompt: render_prompt(&req.question, &context),
            context,
            commits: hits.into_iter().map(|h| h.hash).collect(),
        })
    }

    pub async fn do_reset(&self) -> ArchaeologistResult<ResetResponse> {
        self.session.reset().await?;
        Ok(ResetResponse {
            success: true,
            message: "Index and cloned repository removed".to_string(),
        })
    }
}

/// Relay build progress to the client as MCP progress notifications
async fn forward_progress(
    peer: Peer<RoleServer>,
    token: ProgressToken,
    mut rx: mpsc::UnboundedReceiver<BuildProgress>,
) {
    while let Some(progress) = rx.recv().await {
        let _ = peer
            .notify_progress(ProgressNotificationParam {
                progress_token: token.clone(),
                progress: progress.commits_indexed as f64,
                total: Some(progress.estimated_total as f64),
                message: Some(format!(
                    "Indexed {} of ~{} commits ({} batches)",
                    progress.commits_indexed, progress.estimated_total, progress.batches_completed
                )),
            })
            .await;
    }
}

async fn notify(
    peer: &Option<Peer<RoleServer>>,
    token: &Option<ProgressToken>,
    progress: f64,
    total: Option<f64>,
    message: String,
) {
    if let (Some(peer), Some(token)) = (peer, token) {
        let _ = peer
            .notify_progress(ProgressNotificationParam {
                progress_token: token.clone(),
                progress,
                total,
                message: Some(message),
            })
            .await;
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Serialization failed: {}", e))
}

fn user_error(e: ArchaeologistError) -> String {
    e.to_user_string()
}

#[tool_router(router = tool_router)]
impl ArchaeologistMcpServer {
    #[tool(
        description = "Analyze a git repository's history: walks the branch (most recent first), normalizes every commit with a bounded diff, and builds a fresh semantic index. Provide either a local path or a clone URL. Replaces any previous analysis."
    )]
    async fn analyze_repository(
        &self,
        meta: Meta,
        peer: Peer<RoleServer>,
        Parameters(req): Parameters<AnalyzeRequest>,
    ) -> Result<String, String> {
        let progress_token = meta.get_progress_token();
        let response = self
            .do_analyze(req, Some(peer), progress_token)
            .await
            .map_err(user_error)?;
        to_json(&response)
    }

    #[tool(description = "Find the commits most relevant to a natural-language question")]
    async fn search_history(
        &self,
        Parameters(req): Parameters<SearchHistoryRequest>,
    ) -> Result<String, String> {
        let response = self.do_search(req).await.map_err(user_error)?;
        to_json(&response)
    }

    #[tool(
        description = "Retrieve relevant commits and compose a prompt that asks a language model to answer from that history only"
    )]
    async fn build_prompt(
        &self,
        Parameters(req): Parameters<BuildPromptRequest>,
    ) -> Result<String, String> {
        let response = self.do_build_prompt(req).await.map_err(user_error)?;
        to_json(&response)
    }

    #[tool(description = "Drop the current index and any cloned repository")]
    async fn reset_session(
        &self,
        Parameters(_req): Parameters<ResetRequest>,
    ) -> Result<String, String> {
        let response = self.do_reset().await.map_err(user_error)?;
        to_json(&response)
    }
}

// Prompts for slash commands
#[prompt_router]
impl ArchaeologistMcpServer {
    #[prompt(
        name = "ask-history",
        description = "Answer a question about the project's evolution from its analyzed commit history"
    )]
    async fn ask_history_prompt(
        &self,
        Parameters(args): Parameters<serde_json::Value>,
    ) -> Result<GetPromptResult, McpError> {
        let question = args
            .get("question")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();

        if question.is_empty() {
            return Err(McpError::invalid_params("question is required", None));
        }

        let limit = self.session.config().search.limit;
        let min_score = self.session.config().search.min_score;
        let text = match self.session.search(&question, limit, min_score).await {
            Ok(hits) => render_prompt(&question, &render_context(&hits)),
            Err(e) if e.is_user_error() => format!(
                "{} Please call analyze_repository first, then ask: {}",
                e.to_user_string(),
                question
            ),
            Err(e) => return Err(McpError::internal_error(e.to_user_string(), None)),
        };

        Ok(GetPromptResult {
            description: Some(format!("Commit-history answer for: {}", question)),
            messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
        })
    }
}

#[tool_handler(router = self.tool_router)]
#[prompt_handler]
impl ServerHandler for ArchaeologistMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: "git-archaeologist".into(),
                title: Some("Git Archaeologist - Question Answering over Commit History".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Semantic search over a repository's commit history. \
                Use analyze_repository to index a local path or clone URL, \
                search_history to find relevant commits, and build_prompt to get \
                a grounded prompt for answering a question."
                    .into(),
            ),
        }
    }
}

impl ArchaeologistMcpServer {
    /// Serve over stdin/stdout until the client disconnects or Ctrl-C
    pub async fn serve_stdio(config: Config) -> Result<()> {
        tracing::info!("Starting git-archaeologist MCP server");

        let server = Self::new(config)
            .await
            .context("Failed to create MCP server")?;
        let session = server.session.clone();
        let shutdown = server.shutdown_token();

        let transport = rmcp::transport::io::stdio();
        let running = server.serve(transport).await?;

        tokio::select! {
            result = running.waiting() => {
                result?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                shutdown.cancel();
            }
        }

        session
            .teardown()
            .await
            .context("Failed to tear down session")?;
        Ok(())
    }
}

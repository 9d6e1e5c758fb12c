//! Application state and collaborator wiring.

use crate::config::ServerConfig;
use crate::db::PgExpenseStore;
use crate::error::ServerError;
use pocket_ledger_ai::{GeminiBackend, GeminiConfig, RetryPolicy};
use pocket_ledger_conversation::{
    LocalClock, OrchestratorConfig, ToolCallOrchestrator, ToolCatalog, ToolRegistry,
};
use pocket_ledger_expense::{ExpenseStore, InMemoryExpenseStore};
use pocket_ledger_messaging::{EventRouter, LineClient, LineConfig, RouterConfig};
use rootcause::prelude::Report;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};

/// State shared by every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Routes webhook events to their handlers.
    pub router: EventRouter,
}

impl AppState {
    /// Creates state around an existing router.
    #[must_use]
    pub fn new(router: EventRouter) -> Self {
        Self { router }
    }

    /// Connects every collaborator described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database, a client or the tool registry cannot
    /// be set up.
    pub async fn from_config(config: &ServerConfig) -> Result<Self, Report<ServerError>> {
        let store = connect_store(config).await?;
        let retry =
            RetryPolicy::default().with_max_wait(config.assistant.request_timeout() / 3);

        let backend = GeminiBackend::new(
            GeminiConfig::new(&config.gemini.api_key)
                .with_model(&config.gemini.model)
                .with_base_url(&config.gemini.base_url)
                .with_timeout(config.gemini.timeout()),
        )
        .map_err(|e| ServerError::Client {
            details: e.to_string(),
        })?;

        let registry =
            ToolRegistry::for_expenses(Arc::new(ToolCatalog::expense_tools()), store, retry)
                .map_err(|e| ServerError::Registry {
                    details: e.to_string(),
                })?;

        let clock = LocalClock::new(&config.assistant.timezone);
        let timezone = clock.timezone();
        let orchestrator = ToolCallOrchestrator::new(
            Arc::new(backend),
            Arc::new(registry),
            clock,
            OrchestratorConfig {
                temperature: Some(config.gemini.temperature),
                direct_reply: config.assistant.direct_reply,
                retry,
            },
        );

        let messenger = LineClient::new(
            LineConfig::new(&config.line.channel_access_token)
                .with_base_url(&config.line.api_base_url),
        )
        .map_err(|e| ServerError::Client {
            details: e.to_string(),
        })?;

        let router = EventRouter::new(
            Arc::new(orchestrator),
            Arc::new(messenger),
            RouterConfig {
                scope_prefix: config.assistant.scope_prefix.clone(),
                request_timeout: config.assistant.request_timeout(),
            },
        );
        info!(
            model = %config.gemini.model,
            direct_reply = %config.assistant.direct_reply,
            timezone = timezone.map_or("UTC (unzoned)", |tz| tz.name()),
            "assistant ready"
        );

        Ok(Self::new(router))
    }
}

async fn connect_store(config: &ServerConfig) -> Result<Arc<dyn ExpenseStore>, Report<ServerError>> {
    let Some(url) = config.database_url() else {
        warn!("DATABASE_URL not set, expenses are kept in memory only");
        return Ok(Arc::new(InMemoryExpenseStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .map_err(|e| ServerError::Database {
            details: e.to_string(),
        })?;

    info!("running database migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| ServerError::Database {
            details: e.to_string(),
        })?;

    Ok(Arc::new(PgExpenseStore::new(pool)))
}

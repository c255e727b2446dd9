//! Service wiring: config → Telegram channel → ingestion pipeline, plus the
//! HTTP server for the health probe and webhook ingress.

use crate::channels::{self, ChannelHandle, InboundMessage, TelegramChannel, TelegramUpdate};
use crate::config::{self, Config};
use crate::history::GroupHistory;
use crate::pipeline::{Downloader, Pipeline, ProjectRouting};
use crate::tracker::JiraClient;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Shared state for the HTTP routes.
#[derive(Clone)]
struct ServiceState {
    config: Arc<Config>,
    /// Sender for inbound channel messages (webhook POSTs). Processor task receives.
    inbound_tx: mpsc::Sender<InboundMessage>,
    ingress: &'static str,
}

/// Run the bridge: start channel ingress, the pipeline processor, and the
/// HTTP server; block until shutdown.
pub async fn run_service(config: Config) -> Result<()> {
    let base_url = config
        .tracker
        .base_url
        .clone()
        .context("tracker.baseUrl is not configured (run `bugline init`, then edit the config)")?;
    let credential = config::resolve_tracker_credential(&config).context(
        "tracker credential is not configured (set tracker.credential or BUGLINE_TRACKER_CREDENTIAL)",
    )?;
    let default_project_key = config
        .tracker
        .default_project_key
        .clone()
        .context("tracker.defaultProjectKey is not configured")?;

    let telegram_token = config::resolve_telegram_token(&config);
    let telegram = Arc::new(TelegramChannel::new(telegram_token.clone()));
    let jira = Arc::new(JiraClient::new(
        &base_url,
        &credential,
        &config.tracker.issue_type,
    ));
    let history = Arc::new(GroupHistory::default());

    let pipeline = Arc::new(Pipeline::new(
        telegram.clone(),
        jira,
        telegram.clone(),
        history.clone(),
        Downloader::new(config.pipeline.max_attachment_bytes),
        ProjectRouting {
            default_project_key,
            topic_projects: config.tracker.topic_projects.clone(),
        },
        config::resolve_temp_dir(&config),
        Duration::from_millis(config.pipeline.group_settle_ms),
    ));

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundMessage>(64);

    {
        let history = history.clone();
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            while let Some(message) = inbound_rx.recv().await {
                history.record(&message).await;
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    let outcome = pipeline.handle(message).await;
                    log::debug!("pipeline run finished: {:?}", outcome);
                });
            }
        });
    }

    let webhook_url = config.channels.telegram.webhook_url.clone();
    let mut ingress = "none";
    let mut poll_task: Option<JoinHandle<()>> = None;
    let mut webhook_active = false;
    if telegram_token.is_some() {
        if let Some(ref url) = webhook_url {
            ingress = "webhook";
            let secret = config.channels.telegram.webhook_secret.as_deref();
            if let Err(e) = telegram.set_webhook(url, secret).await {
                log::warn!("telegram set_webhook failed: {}", e);
            } else {
                log::info!("telegram channel registered (webhook mode): {}", url);
                webhook_active = true;
            }
        } else {
            ingress = "poll";
            poll_task = Some(telegram.clone().start_inbound(inbound_tx.clone()));
            log::info!("telegram channel registered and getUpdates loop started");
        }
    } else {
        log::warn!("telegram bot token not configured; channel ingress disabled");
    }

    let state = ServiceState {
        config: Arc::new(config.clone()),
        inbound_tx,
        ingress,
    };
    let app = Router::new()
        .route("/", get(health_http))
        .route("/telegram/webhook", post(telegram_webhook))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.gateway.bind, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("service listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(telegram, poll_task, webhook_active))
        .await
        .context("service exited")?;
    log::info!("service stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Stops the channel connector, removes the Telegram webhook if one was set,
/// then awaits the in-process poll task.
async fn shutdown_signal(
    telegram: Arc<TelegramChannel>,
    poll_task: Option<JoinHandle<()>>,
    webhook_active: bool,
) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, stopping channel ingress");

    telegram.stop();
    if webhook_active {
        if let Err(e) = telegram.delete_webhook().await {
            log::debug!("telegram delete_webhook on shutdown: {}", e);
        }
    }
    if let Some(task) = poll_task {
        let _ = task.await;
    }
    log::info!("channel tasks finished");
}

/// POST /telegram/webhook — receives Telegram update JSON; verifies optional secret, pushes InboundMessage.
async fn telegram_webhook(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(ref expected) = state.config.channels.telegram.webhook_secret {
        let provided = headers
            .get("X-Telegram-Bot-Api-Secret-Token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if provided != expected.as_str() {
            return StatusCode::FORBIDDEN;
        }
    }
    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(_) => return StatusCode::BAD_REQUEST,
    };
    let Some(ref msg) = update.message else {
        return StatusCode::OK;
    };
    let Some(inbound) = channels::to_inbound(msg) else {
        return StatusCode::OK;
    };
    if state.inbound_tx.send(inbound).await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<ServiceState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "channel": "telegram",
        "ingress": state.ingress,
        "port": state.config.gateway.port,
    }))
}

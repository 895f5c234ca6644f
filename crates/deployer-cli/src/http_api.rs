//! HTTP endpoints.
//!
//! Provides:
//! - `/github`, `/gitlab`, `/bitbucket` - provider webhooks
//! - `/deploy/{repo}[/{branch}[/{tag}]]` - manual deploy (GET form, POST run)
//! - `/info` - git installation diagnostics

use std::collections::HashMap;

use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use deployer_core::context::AppContext;
use deployer_core::deploy::{DeployOutcome, DeployRequest, OverrideFlags};
use deployer_core::provider::HeaderSource;
use deployer_core::types::ProviderKind;

use crate::auth::{self, Access};

const DEPLOY_FORM: &str = r#"<form method="POST"><input id="button" type="submit" value="Start"></form><script>document.getElementById("button").focus();</script>"#;

/// Create the router for all endpoints.
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/github", get(github_handler).post(github_handler))
        .route("/gitlab", get(gitlab_handler).post(gitlab_handler))
        .route("/bitbucket", get(bitbucket_handler).post(bitbucket_handler))
        .route("/deploy/{repo}", get(deploy_form).post(deploy_handler))
        .route("/deploy/{repo}/{branch}", get(deploy_form).post(deploy_handler))
        .route(
            "/deploy/{repo}/{branch}/{tag}",
            get(deploy_form).post(deploy_handler),
        )
        .route("/info", get(info_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Bind `listen` and serve until Ctrl-C.
pub async fn serve(ctx: AppContext, listen: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", listen, e))?;
    tracing::info!("Deployer listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// Borrowed request headers for the webhook adapters.
struct RequestHeaders<'a>(&'a HeaderMap);

impl HeaderSource for RequestHeaders<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|value| value.to_str().ok())
    }

    fn pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }
}

fn text(status: u16, body: String) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

fn outcome_response(outcome: DeployOutcome) -> Response {
    text(outcome.status_code(), outcome.body)
}

async fn github_handler(
    State(ctx): State<AppContext>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    webhook(&ctx, ProviderKind::GitHub, &params, &headers, &body).await
}

async fn gitlab_handler(
    State(ctx): State<AppContext>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    webhook(&ctx, ProviderKind::GitLab, &params, &headers, &body).await
}

async fn bitbucket_handler(
    State(ctx): State<AppContext>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    webhook(&ctx, ProviderKind::Bitbucket, &params, &headers, &body).await
}

async fn webhook(
    ctx: &AppContext,
    kind: ProviderKind,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    let flags = override_flags(params);
    match ctx
        .handle_webhook(kind, &RequestHeaders(headers), body, flags)
        .await
    {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => text(e.status_code(), e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct DeployPath {
    repo: String,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    tag: Option<String>,
}

/// Query parameter switches: present and not `0` means on.
fn override_flags(params: &HashMap<String, String>) -> OverrideFlags {
    let flag = |name: &str| params.get(name).is_some_and(|value| value != "0");
    OverrideFlags {
        force: flag("force"),
        ignore_release: flag("ignoreRelease"),
        ignore_tag_date: flag("ignoreTagDate"),
        ignore_tag: flag("ignoreTag"),
    }
}

/// Protection check. `Err` is the 401 response to send back.
fn authorize(ctx: &AppContext, headers: &HeaderMap) -> Result<Option<String>, Response> {
    let config = ctx.config();
    match auth::check(config.protection.as_ref(), headers) {
        Access::Granted { set_cookie } => Ok(set_cookie),
        Access::Denied(reason) => Err(auth::unauthorized(reason)),
    }
}

async fn deploy_form(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(_path): Path<DeployPath>,
) -> Response {
    match authorize(&ctx, &headers) {
        Ok(set_cookie) => auth::with_cookie(Html(DEPLOY_FORM).into_response(), set_cookie),
        Err(denied) => denied,
    }
}

async fn deploy_handler(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(path): Path<DeployPath>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let set_cookie = match authorize(&ctx, &headers) {
        Ok(set_cookie) => set_cookie,
        Err(denied) => return denied,
    };

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let request = DeployRequest::manual(path.repo, path.branch.as_deref().unwrap_or("master"))
        .with_tag(path.tag)
        .with_flags(override_flags(&params))
        .with_host(host);

    let outcome = ctx.manual_deploy(&request).await;
    auth::with_cookie(outcome_response(outcome), set_cookie)
}

async fn info_handler(State(ctx): State<AppContext>, headers: HeaderMap) -> Response {
    let set_cookie = match authorize(&ctx, &headers) {
        Ok(set_cookie) => set_cookie,
        Err(denied) => return denied,
    };
    let report = ctx.system_info(&RequestHeaders(&headers)).await;
    auth::with_cookie(text(200, report), set_cookie)
}

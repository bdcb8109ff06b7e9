//! HTTP surface for a scheduler: one task per request, plus cron fan-out.

use super::super::args::{GlobalArgs, ServeArgs};
use crate::exit_codes::EXIT_SUCCESS;
use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use runwatch_core::{run_task, JobContext, JobError, JobKind, TaskKey, TaskOutcome};
use serde_json::json;

pub(crate) fn router(ctx: JobContext) -> Router {
    Router::new()
        .route("/tasks/:job", post(handle_task))
        .route("/cron/:job", get(handle_cron))
        .route("/healthz", get(|| async { StatusCode::OK }))
        .with_state(ctx)
}

fn parse_job(raw: &str) -> Result<JobKind, Response> {
    raw.parse::<JobKind>().map_err(|e| {
        (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response()
    })
}

/// A 200 acknowledges the task; anything else makes the scheduler redeliver it.
async fn handle_task(State(ctx): State<JobContext>, Path(job): Path<String>, body: String) -> Response {
    let kind = match parse_job(&job) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    // Unparseable keys are dropped with a 200 so they are not redelivered.
    let key = match TaskKey::from_form_body(&body) {
        Ok(key) => key.to_string(),
        Err(e) => {
            tracing::warn!(job = kind.as_str(), error = %e, "dropping task with invalid key");
            return (
                StatusCode::OK,
                Json(json!({ "outcome": TaskOutcome::InvalidKey.as_str() })),
            )
                .into_response();
        }
    };

    let now = runwatch_core::time::now_us();
    let joined = tokio::task::spawn_blocking(move || run_task(&ctx, kind, &key, now)).await;
    task_response(kind, joined)
}

fn task_response(
    kind: JobKind,
    joined: Result<Result<TaskOutcome, JobError>, tokio::task::JoinError>,
) -> Response {
    match joined {
        Ok(Ok(outcome)) => {
            (StatusCode::OK, Json(json!({ "outcome": outcome.as_str() }))).into_response()
        }
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string(), "kind": e.kind() })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(job = kind.as_str(), error = %e, "task panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn handle_cron(State(ctx): State<JobContext>, Path(job): Path<String>) -> Response {
    let kind = match parse_job(&job) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match super::fanout::sweep(ctx, kind, runwatch_core::time::now_us()).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => {
            tracing::error!(job = kind.as_str(), error = %e, "fan-out failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub(crate) async fn run(args: ServeArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let ctx = super::open_context(global)?;
    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    tracing::info!(addr = %args.addr, "serving task endpoints");
    axum::serve(listener, router(ctx)).await?;
    Ok(EXIT_SUCCESS)
}

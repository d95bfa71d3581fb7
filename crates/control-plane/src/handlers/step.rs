//! Step execution endpoint.

use axum::{extract::State, Json};
use chrono::Utc;

use crate::engine;
use crate::error::AppResult;
use crate::payload::{self, InputPayload, OutputPayload};
use crate::state::AppState;

/// Execute one pipeline step.
///
/// `POST /api/step`
///
/// Validates the payload, runs the requested step against the pipeline and
/// vendor buckets, and returns the output payload for the workflow engine.
///
/// # Returns
///
/// - `200 OK` with the output payload, including terminal success/failure
///   outcomes, which are step results rather than HTTP errors
/// - `422 Unprocessable Entity` when the payload fails validation
/// - `502 Bad Gateway` when a bucket operation fails
pub async fn handle_step(
    State(state): State<AppState>,
    Json(payload): Json<InputPayload>,
) -> AppResult<Json<OutputPayload>> {
    let run = payload::parse(&payload, &state.tables)?;
    let output = engine::dispatch(
        &run,
        &state.config,
        &state.tables,
        &state.pipeline_store,
        &state.vendor_store,
        Utc::now(),
    )
    .await?;
    Ok(Json(output))
}

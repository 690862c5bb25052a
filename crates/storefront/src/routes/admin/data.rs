//! Snapshot download and upload.

use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use tracing::instrument;

use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireRoot};
use crate::services::{Snapshot, SnapshotService, snapshot::ImportSummary};
use crate::state::AppState;

/// Download products and users as a JSON attachment.
#[instrument(skip(state, admin), fields(admin = %admin.user.id))]
pub async fn export(State(state): State<AppState>, admin: RequireAdmin) -> Result<Response> {
    let snapshot = SnapshotService::new(state.pool()).export().await?;
    let filename = format!(
        "attachment; filename=\"brokeshop-{}.json\"",
        snapshot.exported_at.format("%Y%m%d-%H%M%S")
    );
    Ok(([(header::CONTENT_DISPOSITION, filename)], Json(snapshot)).into_response())
}

/// Replace all products and users with the uploaded snapshot.
#[instrument(skip(state, root, snapshot), fields(root = %root.user.id))]
pub async fn import(
    State(state): State<AppState>,
    root: RequireRoot,
    Json(snapshot): Json<Snapshot>,
) -> Result<Json<ImportSummary>> {
    let summary = SnapshotService::new(state.pool())
        .import(&snapshot, state.principals())
        .await?;
    Ok(Json(summary))
}

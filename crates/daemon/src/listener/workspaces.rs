// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace CRUD handlers.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use vibox_core::Workspace;
use vibox_engine::CreateWorkspaceRequest;

use super::error::ApiError;
use super::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct UpdatePortsRequest {
    ports: BTreeMap<String, String>,
}

pub(super) async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateWorkspaceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let workspace = state.orchestrator.create_workspace(request)?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

pub(super) async fn list(State(state): State<AppState>) -> Result<Json<Vec<Workspace>>, ApiError> {
    let workspaces = state.orchestrator.list_workspaces()?;
    tracing::debug!(count = workspaces.len(), "listed workspaces");
    Ok(Json(workspaces))
}

pub(super) async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Workspace>, ApiError> {
    Ok(Json(state.orchestrator.get_workspace(&id)?))
}

pub(super) async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.orchestrator.delete_workspace(&id).await?;
    Ok(Json(json!({ "message": "workspace deleted", "id": id })))
}

pub(super) async fn update_ports(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdatePortsRequest>, JsonRejection>,
) -> Result<Json<Workspace>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.orchestrator.update_ports(&id, request.ports)?))
}

pub(super) async fn reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let workspace = state.orchestrator.reset_workspace(&id).await?;
    Ok(Json(json!({ "message": "workspace reset", "workspace": workspace })))
}

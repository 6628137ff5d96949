//! Role administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::SubjectId;
use order_store::DocumentStore;
use roles::{ReconcileResult, Role};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Serialize)]
pub struct RoleResponse {
    pub subject: SubjectId,
    pub role: Role,
}

/// PUT /subjects/{id}/role: grant a role.
///
/// Responds 207 when the claims were updated but the profile mirror failed.
#[tracing::instrument(skip(state, req))]
pub async fn set_role<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<SetRoleRequest>,
) -> Result<(StatusCode, Json<ReconcileResult>), ApiError> {
    let result = state.roles.set_role(&SubjectId::new(id), req.role).await?;
    let status = if result.is_consistent() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(result)))
}

/// GET /subjects/{id}/role: role from the identity claims.
#[tracing::instrument(skip(state))]
pub async fn get_role<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<RoleResponse>, ApiError> {
    let subject = SubjectId::new(id);
    let role = state.roles.get_role(&subject).await?;
    Ok(Json(RoleResponse { subject, role }))
}

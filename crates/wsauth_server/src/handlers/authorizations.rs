use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use serde::Deserialize;
use wsauth_core::{Authorization, AuthorizationResult, CertificateId, IssuanceService, TenantId};

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RequestAuthorizationRequest {
    pub tenant_id: TenantId,
    pub service: String,
}

/// Responds with the flat authorization shape in every case. When the
/// authority reports the grant as pre-existing, `authorization_id`,
/// `created_at` and `updated_at` are null.
pub async fn request_authorization(
    Extension(service): Extension<Arc<IssuanceService>>,
    Json(req): Json<RequestAuthorizationRequest>,
) -> Result<Json<AuthorizationResult>, AppError> {
    let result = service
        .request_authorization(req.tenant_id, &req.service)
        .await?;
    Ok(Json(result))
}

pub async fn list_authorizations_by_tenant(
    Extension(service): Extension<Arc<IssuanceService>>,
    Path(tenant_id): Path<i64>,
) -> Result<Json<Vec<Authorization>>, AppError> {
    let rows = service
        .list_authorizations_by_tenant(TenantId(tenant_id))
        .await?;
    Ok(Json(rows))
}

pub async fn list_authorizations_by_certificate(
    Extension(service): Extension<Arc<IssuanceService>>,
    Path(certificate_id): Path<i64>,
) -> Result<Json<Vec<Authorization>>, AppError> {
    let rows = service
        .list_authorizations_by_certificate(CertificateId(certificate_id))
        .await?;
    Ok(Json(rows))
}

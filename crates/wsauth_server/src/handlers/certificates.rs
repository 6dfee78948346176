use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use wsauth_core::{Certificate, CertificateId, IssuanceService, TenantId};

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ProvisionCertificateRequest {
    pub tenant_id: TenantId,
}

/// Idempotent: a tenant that already has a certificate gets it back.
pub async fn provision_certificate(
    Extension(service): Extension<Arc<IssuanceService>>,
    Json(req): Json<ProvisionCertificateRequest>,
) -> Result<Json<Certificate>, AppError> {
    let cert = service.provision_certificate(req.tenant_id).await?;
    Ok(Json(cert))
}

pub async fn get_certificate(
    Extension(service): Extension<Arc<IssuanceService>>,
    Path(certificate_id): Path<i64>,
) -> Result<Json<Certificate>, AppError> {
    let cert = service
        .get_certificate(CertificateId(certificate_id))
        .await?;
    Ok(Json(cert))
}

pub async fn list_certificates_by_tenant(
    Extension(service): Extension<Arc<IssuanceService>>,
    Path(tenant_id): Path<i64>,
) -> Result<Json<Vec<Certificate>>, AppError> {
    let certs = service
        .list_certificates_by_tenant(TenantId(tenant_id))
        .await?;
    Ok(Json(certs))
}

pub async fn revoke_certificate(
    Extension(service): Extension<Arc<IssuanceService>>,
    Path(certificate_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    service
        .revoke_certificate(CertificateId(certificate_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

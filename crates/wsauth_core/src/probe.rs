//! Pre-flight reads that decide whether a remote call is needed at all.

use anyhow::Result;

use crate::store::IssuanceStore;
use crate::types::{Authorization, Certificate, CertificateId, CertificateOrder, TenantId};

/// The tenant's most recently created certificate.
pub async fn newest_certificate(
    store: &dyn IssuanceStore,
    tenant_id: TenantId,
) -> Result<Option<Certificate>> {
    let mut rows = store
        .certificates_for_tenant(tenant_id, CertificateOrder::NewestFirst, Some(1))
        .await?;
    Ok(rows.pop())
}

/// The persisted authorization for exactly this (certificate, service) pair.
pub async fn existing_authorization(
    store: &dyn IssuanceStore,
    certificate_id: CertificateId,
    service: &str,
) -> Result<Option<Authorization>> {
    store.find_authorization(certificate_id, service).await
}

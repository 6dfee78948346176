//! Caller-facing operation surface.
//!
//! Holds the store handle and hands it to the orchestrator and provisioner on
//! every call. Transport layers (the REST server, tests) talk only to this.

use std::sync::Arc;

use crate::error::{IssuanceError, Result};
use crate::orchestrator::{non_empty, AuthorizationOrchestrator};
use crate::provisioner::CertificateProvisioner;
use crate::store::IssuanceStore;
use crate::types::*;

pub struct IssuanceService {
    store: Arc<dyn IssuanceStore>,
    orchestrator: AuthorizationOrchestrator,
    provisioner: CertificateProvisioner,
}

impl IssuanceService {
    pub fn new(
        store: Arc<dyn IssuanceStore>,
        orchestrator: AuthorizationOrchestrator,
        provisioner: CertificateProvisioner,
    ) -> Self {
        Self {
            store,
            orchestrator,
            provisioner,
        }
    }

    // ── Certificates ──

    pub async fn provision_certificate(&self, tenant_id: TenantId) -> Result<Certificate> {
        self.provisioner
            .provision_certificate(self.store.clone(), tenant_id)
            .await
    }

    pub async fn get_certificate(&self, certificate_id: CertificateId) -> Result<Certificate> {
        self.store
            .load_certificate(certificate_id)
            .await?
            .ok_or_else(|| IssuanceError::NotFound(format!("certificate {certificate_id}")))
    }

    pub async fn list_certificates_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<Certificate>> {
        let rows = self
            .store
            .certificates_for_tenant(tenant_id, CertificateOrder::OldestFirst, None)
            .await?;
        non_empty(rows, || format!("no certificates for tenant {tenant_id}"))
    }

    /// Administrative removal. Authorizations recorded under the certificate
    /// go with it.
    pub async fn revoke_certificate(&self, certificate_id: CertificateId) -> Result<()> {
        if !self.store.delete_certificate(certificate_id).await? {
            return Err(IssuanceError::NotFound(format!(
                "certificate {certificate_id}"
            )));
        }
        tracing::info!(certificate_id = %certificate_id, "certificate revoked");
        Ok(())
    }

    // ── Authorizations ──

    pub async fn request_authorization(
        &self,
        tenant_id: TenantId,
        service: &str,
    ) -> Result<AuthorizationResult> {
        self.orchestrator
            .request_authorization(self.store.clone(), tenant_id, service)
            .await
    }

    pub async fn list_authorizations_by_tenant(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<Authorization>> {
        self.orchestrator
            .list_authorizations_by_tenant(self.store.as_ref(), tenant_id)
            .await
    }

    pub async fn list_authorizations_by_certificate(
        &self,
        certificate_id: CertificateId,
    ) -> Result<Vec<Authorization>> {
        self.orchestrator
            .list_authorizations_by_certificate(self.store.as_ref(), certificate_id)
            .await
    }
}

use crate::types::*;
use anyhow::Result;
use async_trait::async_trait;

/// Outcome of an authorization insert under the (certificate_id, service)
/// uniqueness rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Authorization),
    /// Another writer already holds the pair. Nothing was written.
    Duplicate,
}

/// Outcome of a first-certificate insert for a tenant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CertificateInsert {
    Inserted(Certificate),
    /// The tenant already had a certificate; this is its oldest one and
    /// nothing was written.
    Existing(Certificate),
}

/// Persistence port for tenants, certificates and authorizations.
///
/// Every method is a short-lived unit of work; implementations must not hold
/// a connection or lock beyond the call. Orchestration code receives the store
/// as an explicit argument and never caches rows across calls.
#[async_trait]
pub trait IssuanceStore: Send + Sync {
    // ── Tenants ──

    async fn load_tenant(&self, tenant_id: TenantId) -> Result<Option<Tenant>>;

    // ── Certificates ──

    async fn load_certificate(&self, certificate_id: CertificateId)
        -> Result<Option<Certificate>>;

    /// Certificates of a tenant in the requested order, optionally limited.
    async fn certificates_for_tenant(
        &self,
        tenant_id: TenantId,
        order: CertificateOrder,
        limit: Option<u32>,
    ) -> Result<Vec<Certificate>>;

    async fn insert_certificate(&self, certificate: &NewCertificate) -> Result<Certificate>;

    /// Insert only if the tenant has no certificate yet. Check and insert are
    /// atomic with respect to other writers for the same tenant.
    async fn insert_certificate_if_absent(
        &self,
        certificate: &NewCertificate,
    ) -> Result<CertificateInsert>;

    /// Delete a certificate and, by cascade, its authorizations. Returns
    /// `false` if no such certificate existed.
    async fn delete_certificate(&self, certificate_id: CertificateId) -> Result<bool>;

    // ── Authorizations ──

    async fn find_authorization(
        &self,
        certificate_id: CertificateId,
        service: &str,
    ) -> Result<Option<Authorization>>;

    /// Atomic insert. A uniqueness collision is reported as
    /// `InsertOutcome::Duplicate`, never as an error.
    async fn insert_authorization(&self, authorization: &NewAuthorization)
        -> Result<InsertOutcome>;

    async fn authorizations_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Authorization>>;

    async fn authorizations_for_certificate(
        &self,
        certificate_id: CertificateId,
    ) -> Result<Vec<Authorization>>;
}

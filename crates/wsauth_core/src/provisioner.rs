//! CertificateProvisioner — first-time certificate creation for a tenant.
//!
//! Idempotent per tenant: an existing certificate is returned unchanged.
//! Unlike authorization requests there is no retry loop; a failed remote
//! call surfaces immediately as `ProvisioningFailed` and re-running it is the
//! caller's decision.
//!
//! First-time calls for one tenant are serialized by an in-process lock, and
//! the final insert goes through `insert_certificate_if_absent`, so callers
//! racing across processes still end up sharing one stored certificate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::instrument;

use crate::authority::{AuthorityClient, AuthorityError};
use crate::clock::Clock;
use crate::detach;
use crate::error::{IssuanceError, Result};
use crate::store::{CertificateInsert, IssuanceStore};
use crate::types::*;

/// Alias the authority registers provisioned certificates under.
pub const DEFAULT_CERT_ALIAS: &str = "afipsdk";

pub const DEFAULT_VALIDITY_DAYS: i64 = 365;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

type TenantLocks = Arc<Mutex<HashMap<TenantId, Arc<tokio::sync::Mutex<()>>>>>;

#[derive(Clone)]
pub struct CertificateProvisioner {
    authority: Arc<dyn AuthorityClient>,
    clock: Arc<dyn Clock>,
    alias: String,
    validity: chrono::Duration,
    call_timeout: Duration,
    locks: TenantLocks,
}

impl CertificateProvisioner {
    pub fn new(authority: Arc<dyn AuthorityClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            authority,
            clock,
            alias: DEFAULT_CERT_ALIAS.to_string(),
            validity: chrono::Duration::days(DEFAULT_VALIDITY_DAYS),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            locks: TenantLocks::default(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_validity_days(mut self, days: i64) -> Self {
        self.validity = chrono::Duration::days(days);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    #[instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn provision_certificate(
        &self,
        store: Arc<dyn IssuanceStore>,
        tenant_id: TenantId,
    ) -> Result<Certificate> {
        let tenant = store
            .load_tenant(tenant_id)
            .await?
            .ok_or_else(|| IssuanceError::NotFound(format!("tenant {tenant_id}")))?;

        if let Some(existing) = oldest_certificate(store.as_ref(), tenant_id).await? {
            tracing::info!(
                certificate_id = %existing.certificate_id,
                "tenant already has a certificate, reusing it"
            );
            return Ok(existing);
        }

        if !tenant.is_active {
            return Err(IssuanceError::InvalidInput(format!(
                "tenant {tenant_id} is inactive"
            )));
        }

        let this = self.clone();
        detach::run_detached("provisioning", async move {
            this.provision_locked(store.as_ref(), &tenant).await
        })
        .await
    }

    async fn provision_locked(
        &self,
        store: &dyn IssuanceStore,
        tenant: &Tenant,
    ) -> Result<Certificate> {
        let tenant_id = tenant.tenant_id;
        let lock = self.tenant_lock(tenant_id)?;
        let guard = lock.lock_owned().await;

        // Whoever held the lock before us may have provisioned already.
        let result = match oldest_certificate(store, tenant_id).await {
            Ok(Some(existing)) => {
                tracing::info!(
                    certificate_id = %existing.certificate_id,
                    "certificate provisioned by a concurrent request, reusing it"
                );
                Ok(existing)
            }
            Ok(None) => self.create(store, tenant).await,
            Err(e) => Err(e),
        };

        drop(guard);
        self.release_lock(tenant_id)?;
        result
    }

    async fn create(&self, store: &dyn IssuanceStore, tenant: &Tenant) -> Result<Certificate> {
        let tenant_id = tenant.tenant_id;
        let credentials = tenant.credentials();
        let call = self.authority.create_certificate(&credentials, &self.alias);
        let issued = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(issued)) => issued,
            Ok(Err(e)) => return Err(self.failed(tenant_id, e)),
            Err(_) => return Err(self.failed(tenant_id, AuthorityError::Timeout)),
        };

        let now = self.clock.now();
        let inserted = store
            .insert_certificate_if_absent(&NewCertificate {
                tenant_id,
                cert_alias: self.alias.clone(),
                certificate_pem: issued.certificate_pem,
                private_key_pem: issued.private_key_pem,
                created_at: now,
                expires_at: now + self.validity,
            })
            .await?;

        match inserted {
            CertificateInsert::Inserted(certificate) => {
                tracing::info!(
                    certificate_id = %certificate.certificate_id,
                    expires_at = %certificate.expires_at,
                    "certificate provisioned"
                );
                Ok(certificate)
            }
            CertificateInsert::Existing(certificate) => {
                tracing::warn!(
                    certificate_id = %certificate.certificate_id,
                    "another process stored a certificate first, discarding the one just issued"
                );
                Ok(certificate)
            }
        }
    }

    fn tenant_lock(&self, tenant_id: TenantId) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| poisoned())?;
        Ok(locks.entry(tenant_id).or_default().clone())
    }

    /// Drop the map entry once no other task holds or waits on it.
    fn release_lock(&self, tenant_id: TenantId) -> Result<()> {
        let mut locks = self.locks.lock().map_err(|_| poisoned())?;
        if locks
            .get(&tenant_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&tenant_id);
        }
        Ok(())
    }

    fn failed(&self, tenant_id: TenantId, error: AuthorityError) -> IssuanceError {
        tracing::error!(alias = %self.alias, error = %error, "certificate provisioning failed");
        IssuanceError::ProvisioningFailed {
            tenant_id,
            reason: error.to_string(),
        }
    }
}

async fn oldest_certificate(
    store: &dyn IssuanceStore,
    tenant_id: TenantId,
) -> Result<Option<Certificate>> {
    Ok(store
        .certificates_for_tenant(tenant_id, CertificateOrder::OldestFirst, Some(1))
        .await?
        .pop())
}

fn poisoned() -> IssuanceError {
    IssuanceError::Internal(anyhow::anyhow!("provisioning lock table poisoned"))
}

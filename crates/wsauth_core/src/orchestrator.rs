//! AuthorizationOrchestrator — obtains a per-service authorization ticket for
//! a tenant without ever recording the same (certificate, service) pair twice.
//!
//! ```text
//! newest certificate ─▶ expiry gate ─▶ idempotency probe ─▶ retry loop ─▶ commit
//!        │ none             │ expired        │ hit               │ exhausted
//!        ▼                  ▼                ▼                   ▼
//!     NotFound      CertificateExpired    Existing     AuthorizationExhausted
//! ```
//!
//! Probe, gate and tenant lookup run in the caller's future. The remote call
//! and the commit run on a spawned task, so a caller that goes away after the
//! authority answered `created` still leaves the grant recorded. Nothing in
//! the store is held across the remote call.

use std::sync::Arc;

use tracing::instrument;

use crate::authority::AuthorityClient;
use crate::clock::Clock;
use crate::detach;
use crate::error::{IssuanceError, Result};
use crate::expiry;
use crate::outcome::{self, TicketVerdict};
use crate::probe;
use crate::retry::{Attempt, RetryError, RetryPolicy, RetryReport, RetryingInvoker};
use crate::store::{InsertOutcome, IssuanceStore};
use crate::types::*;

#[derive(Clone)]
pub struct AuthorizationOrchestrator {
    authority: Arc<dyn AuthorityClient>,
    clock: Arc<dyn Clock>,
    invoker: RetryingInvoker,
}

impl AuthorizationOrchestrator {
    pub fn new(
        authority: Arc<dyn AuthorityClient>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            authority,
            clock,
            invoker: RetryingInvoker::new(policy),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        self.invoker.policy()
    }

    /// Authorize `service` for the tenant's newest certificate.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, service = %service))]
    pub async fn request_authorization(
        &self,
        store: Arc<dyn IssuanceStore>,
        tenant_id: TenantId,
        service: &str,
    ) -> Result<AuthorizationResult> {
        let service = normalize_service(service)?;

        let certificate = probe::newest_certificate(store.as_ref(), tenant_id)
            .await?
            .ok_or_else(|| {
                IssuanceError::NotFound(format!("no certificate for tenant {tenant_id}"))
            })?;

        expiry::ensure_valid(&certificate, self.clock.now())?;

        if let Some(existing) =
            probe::existing_authorization(store.as_ref(), certificate.certificate_id, &service)
                .await?
        {
            tracing::info!(
                certificate_id = %certificate.certificate_id,
                service = %service,
                "authorization already recorded, skipping authority call"
            );
            return Ok(AuthorizationResult::Existing(existing));
        }

        let tenant = store
            .load_tenant(tenant_id)
            .await?
            .ok_or_else(|| IssuanceError::NotFound(format!("tenant {tenant_id}")))?;
        if !tenant.is_active {
            return Err(IssuanceError::InvalidInput(format!(
                "tenant {tenant_id} is inactive"
            )));
        }

        let this = self.clone();
        detach::run_detached("authorization", async move {
            this.settle(store.as_ref(), &tenant, &certificate, service)
                .await
        })
        .await
    }

    /// Remote call plus commit. Runs to completion once started.
    async fn settle(
        &self,
        store: &dyn IssuanceStore,
        tenant: &Tenant,
        certificate: &Certificate,
        service: String,
    ) -> Result<AuthorizationResult> {
        let tenant_id = tenant.tenant_id;
        let credentials = tenant.credentials();

        let report = self
            .call_authority(&credentials, &certificate.cert_alias, &service)
            .await
            .map_err(|e| match e {
                RetryError::Exhausted { attempts, failures } => {
                    tracing::error!(
                        service = %service,
                        attempts,
                        "authorization not completed, giving up"
                    );
                    IssuanceError::AuthorizationExhausted {
                        tenant_id,
                        service: service.clone(),
                        attempts,
                        failures,
                    }
                }
                RetryError::DeadlineExceeded { attempts, .. } => {
                    IssuanceError::DeadlineExceeded {
                        tenant_id,
                        service: service.clone(),
                        attempts,
                    }
                }
            })?;

        if !report.failures.is_empty() {
            tracing::info!(
                service = %service,
                attempts = report.attempts,
                failed = report.failures.len(),
                "authority settled after failed attempts"
            );
        }

        match report.value {
            TicketVerdict::RemoteOnly => {
                tracing::info!(
                    service = %service,
                    "authority already holds this authorization, not recording it"
                );
                Ok(AuthorizationResult::RemoteOnly(EphemeralAuthorization {
                    certificate_id: certificate.certificate_id,
                    service,
                    status: STATUS_EXISTS.to_string(),
                }))
            }
            TicketVerdict::Persist => {
                self.commit(store, certificate.certificate_id, service).await
            }
        }
    }

    async fn call_authority(
        &self,
        credentials: &AuthorityCredentials,
        cert_alias: &str,
        service: &str,
    ) -> std::result::Result<RetryReport<TicketVerdict>, RetryError> {
        let authority = self.authority.as_ref();

        self.invoker
            .run(|attempt| async move {
                tracing::info!(attempt, service, "requesting authorization ticket");
                match authority
                    .create_authorization_ticket(credentials, cert_alias, service)
                    .await
                {
                    Ok(response) => {
                        tracing::debug!(
                            status = %response.status,
                            extra = ?response.extra,
                            "authority replied"
                        );
                        match outcome::interpret(&response) {
                            Ok(verdict) => Attempt::Settled(verdict),
                            Err(status) => {
                                Attempt::Failed(format!("unrecognized authority status '{status}'"))
                            }
                        }
                    }
                    Err(e) => Attempt::Failed(e.to_string()),
                }
            })
            .await
    }

    /// Persist a freshly created authorization. Losing the uniqueness race to
    /// a concurrent request is resolved by returning the winner's row.
    async fn commit(
        &self,
        store: &dyn IssuanceStore,
        certificate_id: CertificateId,
        service: String,
    ) -> Result<AuthorizationResult> {
        let new = NewAuthorization {
            certificate_id,
            service,
            status: STATUS_CREATED.to_string(),
            created_at: self.clock.now(),
        };

        match store.insert_authorization(&new).await? {
            InsertOutcome::Inserted(row) => {
                tracing::info!(
                    authorization_id = %row.authorization_id,
                    certificate_id = %certificate_id,
                    service = %row.service,
                    "authorization recorded"
                );
                Ok(AuthorizationResult::Created(row))
            }
            InsertOutcome::Duplicate => {
                tracing::warn!(
                    certificate_id = %certificate_id,
                    service = %new.service,
                    "concurrent request recorded this authorization first, re-reading"
                );
                match store.find_authorization(certificate_id, &new.service).await? {
                    Some(row) => Ok(AuthorizationResult::Reconciled(row)),
                    None => Err(IssuanceError::Conflict(format!(
                        "authorization for certificate {certificate_id} and service '{}' \
                         reported as duplicate but no longer present",
                        new.service
                    ))),
                }
            }
        }
    }

    /// Every authorization recorded under any of the tenant's certificates.
    pub async fn list_authorizations_by_tenant(
        &self,
        store: &dyn IssuanceStore,
        tenant_id: TenantId,
    ) -> Result<Vec<Authorization>> {
        let rows = store.authorizations_for_tenant(tenant_id).await?;
        non_empty(rows, || format!("no authorizations for tenant {tenant_id}"))
    }

    pub async fn list_authorizations_by_certificate(
        &self,
        store: &dyn IssuanceStore,
        certificate_id: CertificateId,
    ) -> Result<Vec<Authorization>> {
        let rows = store.authorizations_for_certificate(certificate_id).await?;
        non_empty(rows, || {
            format!("no authorizations for certificate {certificate_id}")
        })
    }
}

fn normalize_service(service: &str) -> Result<String> {
    let trimmed = service.trim();
    if trimmed.is_empty() {
        return Err(IssuanceError::InvalidInput(
            "service name must not be empty".into(),
        ));
    }
    Ok(trimmed.to_string())
}

/// An empty result set is a uniform not-found condition.
pub(crate) fn non_empty<T>(rows: Vec<T>, what: impl FnOnce() -> String) -> Result<Vec<T>> {
    if rows.is_empty() {
        return Err(IssuanceError::NotFound(what()));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_names_are_trimmed() {
        assert_eq!(normalize_service("  wsfe ").unwrap(), "wsfe");
    }

    #[test]
    fn blank_service_is_rejected() {
        assert!(matches!(
            normalize_service("   "),
            Err(IssuanceError::InvalidInput(_))
        ));
    }

    #[test]
    fn empty_rows_are_not_found() {
        let err = non_empty(Vec::<u8>::new(), || "nothing".into()).unwrap_err();
        assert_eq!(err.to_string(), "not found: nothing");
        assert_eq!(non_empty(vec![1], || unreachable!()).unwrap(), vec![1]);
    }
}

//! Test doubles for the authority port.
//!
//! `ScriptedAuthority` replays a queue of canned replies and counts calls so
//! tests can assert "zero remote calls" and "exactly one provisioning call".

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Barrier;

use crate::authority::{AuthorityClient, AuthorityError, IssuedCertificate, TicketResponse};
use crate::types::{AuthorityCredentials, Tenant, TenantId};

/// One scripted reply to `create_authorization_ticket`.
#[derive(Clone, Debug)]
pub enum TicketStep {
    Status(String),
    Transient(String),
    Rejected(u16),
    /// Never answers; exercises timeouts.
    Stall,
}

impl TicketStep {
    pub fn status(s: &str) -> Self {
        Self::Status(s.to_string())
    }
}

/// One scripted reply to `create_certificate`.
#[derive(Clone, Debug)]
pub enum CertificateStep {
    Issue { cert: String, key: String },
    Fail(String),
    Stall,
}

/// Arguments of one observed ticket call, secret excluded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketCall {
    pub tax_id: String,
    pub username: String,
    pub cert_alias: String,
    pub service: String,
}

#[derive(Default)]
pub struct ScriptedAuthority {
    tickets: Mutex<VecDeque<TicketStep>>,
    certificates: Mutex<VecDeque<CertificateStep>>,
    ticket_calls: AtomicU32,
    certificate_calls: AtomicU32,
    observed: Mutex<Vec<TicketCall>>,
    rendezvous: Option<Arc<Barrier>>,
    latency: Option<Duration>,
}

impl ScriptedAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tickets(steps: impl IntoIterator<Item = TicketStep>) -> Self {
        let authority = Self::new();
        authority
            .tickets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend(steps);
        authority
    }

    /// Hold every remote call until `parties` calls are in flight at once.
    pub fn with_rendezvous(mut self, parties: usize) -> Self {
        self.rendezvous = Some(Arc::new(Barrier::new(parties)));
        self
    }

    /// Delay every reply by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn in_flight(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(barrier) = &self.rendezvous {
            barrier.wait().await;
        }
    }

    pub fn push_ticket(&self, step: TicketStep) {
        self.tickets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(step);
    }

    pub fn push_certificate(&self, step: CertificateStep) {
        self.certificates
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(step);
    }

    pub fn issue_certificate(&self, cert: &str, key: &str) {
        self.push_certificate(CertificateStep::Issue {
            cert: cert.to_string(),
            key: key.to_string(),
        });
    }

    pub fn ticket_calls(&self) -> u32 {
        self.ticket_calls.load(Ordering::SeqCst)
    }

    pub fn certificate_calls(&self) -> u32 {
        self.certificate_calls.load(Ordering::SeqCst)
    }

    pub fn observed_ticket_calls(&self) -> Vec<TicketCall> {
        self.observed
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn next_ticket(&self) -> Option<TicketStep> {
        self.tickets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
    }

    fn next_certificate(&self) -> Option<CertificateStep> {
        self.certificates
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
    }
}

#[async_trait]
impl AuthorityClient for ScriptedAuthority {
    async fn create_certificate(
        &self,
        _credentials: &AuthorityCredentials,
        _alias: &str,
    ) -> Result<IssuedCertificate, AuthorityError> {
        self.certificate_calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight().await;
        match self.next_certificate() {
            Some(CertificateStep::Issue { cert, key }) => Ok(IssuedCertificate {
                certificate_pem: cert,
                private_key_pem: key,
            }),
            Some(CertificateStep::Fail(reason)) => Err(AuthorityError::Transient(reason)),
            Some(CertificateStep::Stall) => std::future::pending().await,
            None => Err(AuthorityError::Transient("no scripted certificate".into())),
        }
    }

    async fn create_authorization_ticket(
        &self,
        credentials: &AuthorityCredentials,
        cert_alias: &str,
        service: &str,
    ) -> Result<TicketResponse, AuthorityError> {
        self.ticket_calls.fetch_add(1, Ordering::SeqCst);
        self.observed
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(TicketCall {
                tax_id: credentials.tax_id.clone(),
                username: credentials.username.clone(),
                cert_alias: cert_alias.to_string(),
                service: service.to_string(),
            });

        let step = self.next_ticket();
        self.in_flight().await;

        match step {
            Some(TicketStep::Status(status)) => Ok(TicketResponse::with_status(status)),
            Some(TicketStep::Transient(reason)) => Err(AuthorityError::Transient(reason)),
            Some(TicketStep::Rejected(status)) => Err(AuthorityError::Rejected {
                status,
                body: "rejected by script".into(),
            }),
            Some(TicketStep::Stall) => std::future::pending().await,
            None => Err(AuthorityError::Transient("no scripted ticket reply".into())),
        }
    }
}

/// A tenant with throwaway credentials.
pub fn sample_tenant(id: i64) -> Tenant {
    Tenant {
        tenant_id: TenantId(id),
        tax_id: format!("20{id:09}3"),
        username: format!("acct-{id}"),
        secret: format!("secret-{id}"),
        is_active: true,
    }
}

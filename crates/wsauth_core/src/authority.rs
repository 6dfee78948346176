//! Port to the external tax authority.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::AuthorityCredentials;

/// Certificate/key pair returned by a provisioning call.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct IssuedCertificate {
    #[serde(rename = "cert")]
    pub certificate_pem: String,
    #[serde(rename = "key")]
    pub private_key_pem: String,
}

impl std::fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("certificate_pem_len", &self.certificate_pem.len())
            .field("private_key_pem", &"<redacted>")
            .finish()
    }
}

/// Structured reply to an authorization-ticket request.
///
/// Only `status` carries meaning here; everything else is kept verbatim for
/// logging.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketResponse {
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TicketResponse {
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthorityError {
    /// Network failure, 5xx or throttling. Worth another attempt.
    #[error("authority unavailable: {0}")]
    Transient(String),

    /// The authority answered and refused the request.
    #[error("authority rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("authority call timed out")]
    Timeout,

    #[error("undecodable authority response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait AuthorityClient: Send + Sync {
    /// Create a certificate/key pair registered under `alias`.
    async fn create_certificate(
        &self,
        credentials: &AuthorityCredentials,
        alias: &str,
    ) -> Result<IssuedCertificate, AuthorityError>;

    /// Ask the authority to authorize `service` for the certificate known to
    /// it as `cert_alias`.
    async fn create_authorization_ticket(
        &self,
        credentials: &AuthorityCredentials,
        cert_alias: &str,
        service: &str,
    ) -> Result<TicketResponse, AuthorityError>;
}

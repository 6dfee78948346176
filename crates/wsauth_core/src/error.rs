use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::retry::AttemptFailure;
use crate::types::{CertificateId, TenantId};

pub type Result<T> = std::result::Result<T, IssuanceError>;

/// Caller-facing failures of the issuance flows.
///
/// Remote errors inside the retry loop never surface individually; only the
/// aggregate (`AuthorizationExhausted` / `DeadlineExceeded`) does.
#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("certificate {certificate_id} expired at {expired_at}")]
    CertificateExpired {
        certificate_id: CertificateId,
        expired_at: DateTime<Utc>,
    },

    #[error(
        "authorization of service '{service}' for tenant {tenant_id} not completed after {attempts} attempt(s); retry later"
    )]
    AuthorizationExhausted {
        tenant_id: TenantId,
        service: String,
        attempts: u32,
        failures: Vec<AttemptFailure>,
    },

    #[error(
        "authorization of service '{service}' for tenant {tenant_id} exceeded its deadline after {attempts} attempt(s)"
    )]
    DeadlineExceeded {
        tenant_id: TenantId,
        service: String,
        attempts: u32,
    },

    #[error("certificate provisioning for tenant {tenant_id} failed: {reason}")]
    ProvisioningFailed { tenant_id: TenantId, reason: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IssuanceError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::CertificateExpired { .. } => 400,
            Self::AuthorizationExhausted { .. } => 503,
            Self::DeadlineExceeded { .. } => 504,
            Self::ProvisioningFailed { .. } => 502,
            Self::Conflict(_) => 409,
            Self::InvalidInput(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn http_status_per_variant() {
        let expired_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let cases: Vec<(IssuanceError, u16)> = vec![
            (IssuanceError::NotFound("x".into()), 404),
            (
                IssuanceError::CertificateExpired {
                    certificate_id: CertificateId(1),
                    expired_at,
                },
                400,
            ),
            (
                IssuanceError::AuthorizationExhausted {
                    tenant_id: TenantId(1),
                    service: "wsfe".into(),
                    attempts: 3,
                    failures: vec![],
                },
                503,
            ),
            (
                IssuanceError::DeadlineExceeded {
                    tenant_id: TenantId(1),
                    service: "wsfe".into(),
                    attempts: 2,
                },
                504,
            ),
            (
                IssuanceError::ProvisioningFailed {
                    tenant_id: TenantId(1),
                    reason: "down".into(),
                },
                502,
            ),
            (IssuanceError::Conflict("x".into()), 409),
            (IssuanceError::InvalidInput("x".into()), 400),
            (IssuanceError::Internal(anyhow::anyhow!("boom")), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.http_status(), status, "{err}");
        }
    }

    #[test]
    fn exhausted_display_carries_diagnostics() {
        let err = IssuanceError::AuthorizationExhausted {
            tenant_id: TenantId(42),
            service: "wsfe".into(),
            attempts: 3,
            failures: vec![],
        };
        assert_eq!(
            err.to_string(),
            "authorization of service 'wsfe' for tenant 42 not completed after 3 attempt(s); retry later"
        );
    }

    #[test]
    fn display_internal() {
        let e = IssuanceError::Internal(anyhow::anyhow!("pool closed"));
        assert_eq!(e.to_string(), "internal: pool closed");
    }
}

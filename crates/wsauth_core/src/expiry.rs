//! Certificate expiry check, evaluated at call time.

use chrono::{DateTime, Utc};

use crate::error::{IssuanceError, Result};
use crate::types::Certificate;

/// Expired once `now` reaches `expires_at`; the boundary instant is expired.
pub fn is_expired(certificate: &Certificate, now: DateTime<Utc>) -> bool {
    now >= certificate.expires_at
}

/// Fail fast with `CertificateExpired` for an unusable certificate.
pub fn ensure_valid(certificate: &Certificate, now: DateTime<Utc>) -> Result<()> {
    if is_expired(certificate, now) {
        return Err(IssuanceError::CertificateExpired {
            certificate_id: certificate.certificate_id,
            expired_at: certificate.expires_at,
        });
    }
    Ok(())
}

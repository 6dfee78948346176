//! Row shapes as Postgres returns them, converted into core types.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use wsauth_core::types::*;

#[derive(Debug, FromRow)]
pub(crate) struct PgTenantRow {
    pub tenant_id: i64,
    pub tax_id: String,
    pub username: String,
    pub secret: String,
    pub is_active: bool,
}

impl From<PgTenantRow> for Tenant {
    fn from(r: PgTenantRow) -> Self {
        Self {
            tenant_id: TenantId(r.tenant_id),
            tax_id: r.tax_id,
            username: r.username,
            secret: r.secret,
            is_active: r.is_active,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PgCertificateRow {
    pub certificate_id: i64,
    pub tenant_id: i64,
    pub cert_alias: String,
    pub certificate_pem: String,
    pub private_key_pem: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<PgCertificateRow> for Certificate {
    fn from(r: PgCertificateRow) -> Self {
        Self {
            certificate_id: CertificateId(r.certificate_id),
            tenant_id: TenantId(r.tenant_id),
            cert_alias: r.cert_alias,
            certificate_pem: r.certificate_pem,
            private_key_pem: r.private_key_pem,
            created_at: r.created_at,
            updated_at: r.updated_at,
            expires_at: r.expires_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PgAuthorizationRow {
    pub authorization_id: i64,
    pub certificate_id: i64,
    pub service: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PgAuthorizationRow> for Authorization {
    fn from(r: PgAuthorizationRow) -> Self {
        Self {
            authorization_id: AuthorizationId(r.authorization_id),
            certificate_id: CertificateId(r.certificate_id),
            service: r.service,
            status: r.status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

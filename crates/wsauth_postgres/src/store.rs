//! Postgres implementation of the `IssuanceStore` port.
//!
//! Each method runs one statement on a pooled connection, except the
//! first-certificate insert, which takes a short transaction. No transaction
//! spans the remote authority call.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use sqlx::PgPool;

use wsauth_core::store::{CertificateInsert, InsertOutcome, IssuanceStore};
use wsauth_core::types::*;

use crate::sqlx_types::{PgAuthorizationRow, PgCertificateRow, PgTenantRow};

type Result<T> = anyhow::Result<T>;

const CERTIFICATE_COLUMNS: &str = "certificate_id, tenant_id, cert_alias, certificate_pem, \
     private_key_pem, created_at, updated_at, expires_at";

pub struct PgIssuanceStore {
    pool: PgPool,
}

impl PgIssuanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("running wsauth migrations")?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl IssuanceStore for PgIssuanceStore {
    async fn load_tenant(&self, tenant_id: TenantId) -> Result<Option<Tenant>> {
        let row = sqlx::query_as::<_, PgTenantRow>(
            r#"
            SELECT tenant_id, tax_id, username, secret, is_active
            FROM tenants
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(Tenant::from))
    }

    async fn load_certificate(
        &self,
        certificate_id: CertificateId,
    ) -> Result<Option<Certificate>> {
        let query = format!("SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE certificate_id = $1");
        let row = sqlx::query_as::<_, PgCertificateRow>(&query)
            .bind(certificate_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(row.map(Certificate::from))
    }

    async fn certificates_for_tenant(
        &self,
        tenant_id: TenantId,
        order: CertificateOrder,
        limit: Option<u32>,
    ) -> Result<Vec<Certificate>> {
        let ordering = match order {
            CertificateOrder::NewestFirst => "created_at DESC, certificate_id DESC",
            CertificateOrder::OldestFirst => "created_at ASC, certificate_id ASC",
        };
        // A NULL limit is LIMIT ALL.
        let query = format!(
            r#"
            SELECT {CERTIFICATE_COLUMNS}
            FROM certificates
            WHERE tenant_id = $1
            ORDER BY {ordering}
            LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, PgCertificateRow>(&query)
            .bind(tenant_id.0)
            .bind(limit.map(i64::from))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Certificate::from).collect())
    }

    async fn insert_certificate(&self, certificate: &NewCertificate) -> Result<Certificate> {
        let query = format!(
            r#"
            INSERT INTO certificates
                (tenant_id, cert_alias, certificate_pem, private_key_pem,
                 created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $5, $6)
            RETURNING {CERTIFICATE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PgCertificateRow>(&query)
            .bind(certificate.tenant_id.0)
            .bind(&certificate.cert_alias)
            .bind(&certificate.certificate_pem)
            .bind(&certificate.private_key_pem)
            .bind(certificate.created_at)
            .bind(certificate.expires_at)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("inserting certificate for tenant {}", certificate.tenant_id))?;
        Ok(row.into())
    }

    async fn insert_certificate_if_absent(
        &self,
        certificate: &NewCertificate,
    ) -> Result<CertificateInsert> {
        let tenant_id = certificate.tenant_id;
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;

        // Serializes first-certificate inserts per tenant until commit.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(tenant_id.0)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("locking certificates of tenant {tenant_id}"))?;

        let existing = format!(
            r#"
            SELECT {CERTIFICATE_COLUMNS}
            FROM certificates
            WHERE tenant_id = $1
            ORDER BY created_at ASC, certificate_id ASC
            LIMIT 1
            "#
        );
        if let Some(row) = sqlx::query_as::<_, PgCertificateRow>(&existing)
            .bind(tenant_id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?
        {
            tx.commit().await.map_err(|e| anyhow!(e))?;
            return Ok(CertificateInsert::Existing(row.into()));
        }

        let insert = format!(
            r#"
            INSERT INTO certificates
                (tenant_id, cert_alias, certificate_pem, private_key_pem,
                 created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $5, $6)
            RETURNING {CERTIFICATE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PgCertificateRow>(&insert)
            .bind(tenant_id.0)
            .bind(&certificate.cert_alias)
            .bind(&certificate.certificate_pem)
            .bind(&certificate.private_key_pem)
            .bind(certificate.created_at)
            .bind(certificate.expires_at)
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("inserting first certificate for tenant {tenant_id}"))?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(CertificateInsert::Inserted(row.into()))
    }

    async fn delete_certificate(&self, certificate_id: CertificateId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM certificates WHERE certificate_id = $1")
            .bind(certificate_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_authorization(
        &self,
        certificate_id: CertificateId,
        service: &str,
    ) -> Result<Option<Authorization>> {
        let row = sqlx::query_as::<_, PgAuthorizationRow>(
            r#"
            SELECT authorization_id, certificate_id, service, status, created_at, updated_at
            FROM authorizations
            WHERE certificate_id = $1 AND service = $2
            "#,
        )
        .bind(certificate_id.0)
        .bind(service)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(Authorization::from))
    }

    async fn insert_authorization(
        &self,
        authorization: &NewAuthorization,
    ) -> Result<InsertOutcome> {
        let row = sqlx::query_as::<_, PgAuthorizationRow>(
            r#"
            INSERT INTO authorizations (certificate_id, service, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (certificate_id, service) DO NOTHING
            RETURNING authorization_id, certificate_id, service, status, created_at, updated_at
            "#,
        )
        .bind(authorization.certificate_id.0)
        .bind(&authorization.service)
        .bind(&authorization.status)
        .bind(authorization.created_at)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| {
            format!(
                "inserting authorization for certificate {} service '{}'",
                authorization.certificate_id, authorization.service
            )
        })?;

        Ok(match row {
            Some(row) => InsertOutcome::Inserted(row.into()),
            None => InsertOutcome::Duplicate,
        })
    }

    async fn authorizations_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Authorization>> {
        let rows = sqlx::query_as::<_, PgAuthorizationRow>(
            r#"
            SELECT a.authorization_id, a.certificate_id, a.service, a.status,
                   a.created_at, a.updated_at
            FROM authorizations a
            JOIN certificates c ON c.certificate_id = a.certificate_id
            WHERE c.tenant_id = $1
            ORDER BY a.authorization_id
            "#,
        )
        .bind(tenant_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Authorization::from).collect())
    }

    async fn authorizations_for_certificate(
        &self,
        certificate_id: CertificateId,
    ) -> Result<Vec<Authorization>> {
        let rows = sqlx::query_as::<_, PgAuthorizationRow>(
            r#"
            SELECT authorization_id, certificate_id, service, status, created_at, updated_at
            FROM authorizations
            WHERE certificate_id = $1
            ORDER BY authorization_id
            "#,
        )
        .bind(certificate_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Authorization::from).collect())
    }
}

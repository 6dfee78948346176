//! In-process `IssuanceStore` backed by ordered maps.
//!
//! Enforces the same rules as the Postgres adapter: unique
//! (certificate_id, service), cascade from certificate to authorizations,
//! ids assigned from monotonically increasing counters.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{CertificateInsert, InsertOutcome, IssuanceStore};
use crate::types::*;

#[derive(Default)]
struct Inner {
    tenants: BTreeMap<TenantId, Tenant>,
    certificates: BTreeMap<CertificateId, Certificate>,
    authorizations: BTreeMap<AuthorizationId, Authorization>,
    next_certificate_id: i64,
    next_authorization_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a tenant row. Tenants are owned by the surrounding
    /// CRUD, so this is not part of the port.
    pub async fn insert_tenant(&self, tenant: Tenant) {
        self.inner
            .write()
            .await
            .tenants
            .insert(tenant.tenant_id, tenant);
    }

    pub async fn authorization_count(&self) -> usize {
        self.inner.read().await.authorizations.len()
    }

    pub async fn certificate_count(&self) -> usize {
        self.inner.read().await.certificates.len()
    }
}

fn sort_certificates(rows: &mut [Certificate], order: CertificateOrder) {
    rows.sort_by_key(|c| (c.created_at, c.certificate_id));
    if order == CertificateOrder::NewestFirst {
        rows.reverse();
    }
}

fn insert_certificate_row(inner: &mut Inner, certificate: &NewCertificate) -> Result<Certificate> {
    if !inner.tenants.contains_key(&certificate.tenant_id) {
        return Err(anyhow!(
            "foreign key violation: tenant {} does not exist",
            certificate.tenant_id
        ));
    }
    inner.next_certificate_id += 1;
    let row = Certificate {
        certificate_id: CertificateId(inner.next_certificate_id),
        tenant_id: certificate.tenant_id,
        cert_alias: certificate.cert_alias.clone(),
        certificate_pem: certificate.certificate_pem.clone(),
        private_key_pem: certificate.private_key_pem.clone(),
        created_at: certificate.created_at,
        updated_at: certificate.created_at,
        expires_at: certificate.expires_at,
    };
    inner.certificates.insert(row.certificate_id, row.clone());
    Ok(row)
}

#[async_trait]
impl IssuanceStore for MemoryStore {
    async fn load_tenant(&self, tenant_id: TenantId) -> Result<Option<Tenant>> {
        Ok(self.inner.read().await.tenants.get(&tenant_id).cloned())
    }

    async fn load_certificate(
        &self,
        certificate_id: CertificateId,
    ) -> Result<Option<Certificate>> {
        Ok(self
            .inner
            .read()
            .await
            .certificates
            .get(&certificate_id)
            .cloned())
    }

    async fn certificates_for_tenant(
        &self,
        tenant_id: TenantId,
        order: CertificateOrder,
        limit: Option<u32>,
    ) -> Result<Vec<Certificate>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Certificate> = inner
            .certificates
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        sort_certificates(&mut rows, order);
        if let Some(limit) = limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn insert_certificate(&self, certificate: &NewCertificate) -> Result<Certificate> {
        let mut inner = self.inner.write().await;
        insert_certificate_row(&mut inner, certificate)
    }

    async fn insert_certificate_if_absent(
        &self,
        certificate: &NewCertificate,
    ) -> Result<CertificateInsert> {
        let mut inner = self.inner.write().await;
        let mut existing: Vec<Certificate> = inner
            .certificates
            .values()
            .filter(|c| c.tenant_id == certificate.tenant_id)
            .cloned()
            .collect();
        if !existing.is_empty() {
            sort_certificates(&mut existing, CertificateOrder::OldestFirst);
            return Ok(CertificateInsert::Existing(existing.swap_remove(0)));
        }
        Ok(CertificateInsert::Inserted(insert_certificate_row(
            &mut inner,
            certificate,
        )?))
    }

    async fn delete_certificate(&self, certificate_id: CertificateId) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if inner.certificates.remove(&certificate_id).is_none() {
            return Ok(false);
        }
        inner
            .authorizations
            .retain(|_, a| a.certificate_id != certificate_id);
        Ok(true)
    }

    async fn find_authorization(
        &self,
        certificate_id: CertificateId,
        service: &str,
    ) -> Result<Option<Authorization>> {
        Ok(self
            .inner
            .read()
            .await
            .authorizations
            .values()
            .find(|a| a.certificate_id == certificate_id && a.service == service)
            .cloned())
    }

    async fn insert_authorization(
        &self,
        authorization: &NewAuthorization,
    ) -> Result<InsertOutcome> {
        let mut inner = self.inner.write().await;
        if !inner
            .certificates
            .contains_key(&authorization.certificate_id)
        {
            return Err(anyhow!(
                "foreign key violation: certificate {} does not exist",
                authorization.certificate_id
            ));
        }
        let taken = inner.authorizations.values().any(|a| {
            a.certificate_id == authorization.certificate_id
                && a.service == authorization.service
        });
        if taken {
            return Ok(InsertOutcome::Duplicate);
        }
        inner.next_authorization_id += 1;
        let row = Authorization {
            authorization_id: AuthorizationId(inner.next_authorization_id),
            certificate_id: authorization.certificate_id,
            service: authorization.service.clone(),
            status: authorization.status.clone(),
            created_at: authorization.created_at,
            updated_at: authorization.created_at,
        };
        inner.authorizations.insert(row.authorization_id, row.clone());
        Ok(InsertOutcome::Inserted(row))
    }

    async fn authorizations_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Authorization>> {
        let inner = self.inner.read().await;
        Ok(inner
            .authorizations
            .values()
            .filter(|a| {
                inner
                    .certificates
                    .get(&a.certificate_id)
                    .is_some_and(|c| c.tenant_id == tenant_id)
            })
            .cloned()
            .collect())
    }

    async fn authorizations_for_certificate(
        &self,
        certificate_id: CertificateId,
    ) -> Result<Vec<Authorization>> {
        Ok(self
            .inner
            .read()
            .await
            .authorizations
            .values()
            .filter(|a| a.certificate_id == certificate_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
    }

    fn tenant(id: i64) -> Tenant {
        Tenant {
            tenant_id: TenantId(id),
            tax_id: "20111111112".into(),
            username: format!("acct-{id}"),
            secret: "s3cret".into(),
            is_active: true,
        }
    }

    fn new_cert(tenant_id: i64, created_at: DateTime<Utc>) -> NewCertificate {
        NewCertificate {
            tenant_id: TenantId(tenant_id),
            cert_alias: "afipsdk".into(),
            certificate_pem: "cert".into(),
            private_key_pem: "key".into(),
            created_at,
            expires_at: created_at + Duration::days(365),
        }
    }

    fn new_auth(certificate_id: CertificateId, service: &str) -> NewAuthorization {
        NewAuthorization {
            certificate_id,
            service: service.into(),
            status: STATUS_CREATED.into(),
            created_at: t0(),
        }
    }

    #[tokio::test]
    async fn newest_first_orders_by_creation_then_id() {
        let store = MemoryStore::new();
        store.insert_tenant(tenant(1)).await;
        let old = store.insert_certificate(&new_cert(1, t0())).await.unwrap();
        let new = store
            .insert_certificate(&new_cert(1, t0() + Duration::hours(1)))
            .await
            .unwrap();
        let tie = store
            .insert_certificate(&new_cert(1, t0() + Duration::hours(1)))
            .await
            .unwrap();

        let newest = store
            .certificates_for_tenant(TenantId(1), CertificateOrder::NewestFirst, Some(1))
            .await
            .unwrap();
        assert_eq!(newest, vec![tie.clone()]);

        let oldest = store
            .certificates_for_tenant(TenantId(1), CertificateOrder::OldestFirst, None)
            .await
            .unwrap();
        assert_eq!(oldest, vec![old, new, tie]);
    }

    #[tokio::test]
    async fn duplicate_pair_is_reported_not_written() {
        let store = MemoryStore::new();
        store.insert_tenant(tenant(1)).await;
        let cert = store.insert_certificate(&new_cert(1, t0())).await.unwrap();

        let first = store
            .insert_authorization(&new_auth(cert.certificate_id, "wsfe"))
            .await
            .unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));

        let second = store
            .insert_authorization(&new_auth(cert.certificate_id, "wsfe"))
            .await
            .unwrap();
        assert_eq!(second, InsertOutcome::Duplicate);
        assert_eq!(store.authorization_count().await, 1);
    }

    #[tokio::test]
    async fn delete_certificate_cascades() {
        let store = MemoryStore::new();
        store.insert_tenant(tenant(1)).await;
        let cert = store.insert_certificate(&new_cert(1, t0())).await.unwrap();
        store
            .insert_authorization(&new_auth(cert.certificate_id, "wsfe"))
            .await
            .unwrap();

        assert!(store.delete_certificate(cert.certificate_id).await.unwrap());
        assert_eq!(store.authorization_count().await, 0);
        assert!(!store.delete_certificate(cert.certificate_id).await.unwrap());
    }

    #[tokio::test]
    async fn insert_rejects_unknown_parents() {
        let store = MemoryStore::new();
        assert!(store.insert_certificate(&new_cert(5, t0())).await.is_err());
        assert!(store
            .insert_authorization(&new_auth(CertificateId(99), "wsfe"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn tenant_listing_spans_certificates() {
        let store = MemoryStore::new();
        store.insert_tenant(tenant(1)).await;
        store.insert_tenant(tenant(2)).await;
        let a = store.insert_certificate(&new_cert(1, t0())).await.unwrap();
        let b = store.insert_certificate(&new_cert(1, t0())).await.unwrap();
        let other = store.insert_certificate(&new_cert(2, t0())).await.unwrap();
        for (cert, service) in [(&a, "wsfe"), (&b, "wsmtxca"), (&other, "wsfe")] {
            store
                .insert_authorization(&new_auth(cert.certificate_id, service))
                .await
                .unwrap();
        }

        let rows = store.authorizations_for_tenant(TenantId(1)).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows
            .iter()
            .all(|r| r.certificate_id == a.certificate_id || r.certificate_id == b.certificate_id));
    }

    #[tokio::test]
    async fn first_certificate_insert_keeps_the_oldest() {
        let store = MemoryStore::new();
        store.insert_tenant(tenant(1)).await;

        let first = match store
            .insert_certificate_if_absent(&new_cert(1, t0()))
            .await
            .unwrap()
        {
            CertificateInsert::Inserted(cert) => cert,
            other => panic!("expected Inserted, got {other:?}"),
        };
        let second = store
            .insert_certificate_if_absent(&new_cert(1, t0() + Duration::hours(2)))
            .await
            .unwrap();

        assert_eq!(second, CertificateInsert::Existing(first));
        assert_eq!(store.certificate_count().await, 1);
    }
}

//! Router construction for the wsauth server.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;
use wsauth_core::IssuanceService;

use crate::handlers;

/// Build the full axum router. All issuance routes live under `/api/v1`.
pub fn build_router(service: Arc<IssuanceService>) -> Router {
    let api = Router::new()
        // Certificates
        .route(
            "/certificates",
            post(handlers::certificates::provision_certificate),
        )
        .route(
            "/certificates/:certificate_id",
            get(handlers::certificates::get_certificate)
                .delete(handlers::certificates::revoke_certificate),
        )
        .route(
            "/certificates/by_tenant/:tenant_id",
            get(handlers::certificates::list_certificates_by_tenant),
        )
        // Authorizations
        .route(
            "/authorizations",
            post(handlers::authorizations::request_authorization),
        )
        .route(
            "/authorizations/:tenant_id",
            get(handlers::authorizations::list_authorizations_by_tenant),
        )
        .route(
            "/authorizations/by_certificate/:certificate_id",
            get(handlers::authorizations::list_authorizations_by_certificate),
        );

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api/v1", api)
        .layer(Extension(service))
        .layer(TraceLayer::new_for_http())
}

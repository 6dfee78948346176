//! PostgreSQL adapter for `wsauth_core`.
//!
//! `PgIssuanceStore` implements the `IssuanceStore` port with runtime-checked
//! sqlx queries, so building the crate never needs a live database.

mod sqlx_types;
pub mod store;

pub use store::PgIssuanceStore;

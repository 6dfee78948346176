//! HTTP surface for certificate provisioning and authorization tickets.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;

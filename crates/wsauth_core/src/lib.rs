//! Certificate provisioning and authorization-ticket orchestration against
//! the tax authority.
//!
//! Keeps three sources of truth consistent: the local store, the request in
//! flight to the authority, and whatever the authority already holds. Ports
//! (`IssuanceStore`, `AuthorityClient`, `Clock`) keep the logic independent of
//! Postgres and HTTP.

pub mod authority;
pub mod authority_http;
pub mod clock;
mod detach;
pub mod error;
pub mod expiry;
pub mod orchestrator;
pub mod outcome;
pub mod probe;
pub mod provisioner;
pub mod retry;
pub mod service;
pub mod store;
pub mod store_memory;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use authority::{AuthorityClient, AuthorityError, IssuedCertificate, TicketResponse};
pub use authority_http::HttpAuthorityClient;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::IssuanceError;
pub use orchestrator::AuthorizationOrchestrator;
pub use provisioner::CertificateProvisioner;
pub use retry::{RetryPolicy, RetryingInvoker};
pub use service::IssuanceService;
pub use store::{CertificateInsert, InsertOutcome, IssuanceStore};
pub use store_memory::MemoryStore;
pub use types::*;

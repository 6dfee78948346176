//! Interpretation of authority ticket statuses.

use crate::authority::TicketResponse;
use crate::types::{STATUS_CREATED, STATUS_EXISTS};

/// Authority status after trimming and lower-casing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorityStatus {
    Created,
    Exists,
    Unrecognized(String),
}

impl AuthorityStatus {
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            STATUS_CREATED => Self::Created,
            STATUS_EXISTS => Self::Exists,
            _ => Self::Unrecognized(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => STATUS_CREATED,
            Self::Exists => STATUS_EXISTS,
            Self::Unrecognized(s) => s,
        }
    }
}

/// Settled meaning of a ticket response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TicketVerdict {
    /// Freshly created remotely: persist a row.
    Persist,
    /// Already held remotely: answer with an ephemeral result, persist nothing.
    RemoteOnly,
}

/// Any status other than `created` or `exists` is unsettled and comes back
/// as the normalized status string; the caller spends an attempt on it.
pub fn interpret(response: &TicketResponse) -> Result<TicketVerdict, String> {
    match AuthorityStatus::parse(&response.status) {
        AuthorityStatus::Created => Ok(TicketVerdict::Persist),
        AuthorityStatus::Exists => Ok(TicketVerdict::RemoteOnly),
        AuthorityStatus::Unrecognized(status) => Err(status),
    }
}

//! Hostname to backend resolution
//!
//! A pure function over a freshly fetched container snapshot set. Keeping it
//! free of engine access means routing decisions are deterministic and
//! unit-testable, and the table can never go stale.

use crate::orchestrator::{ContainerSnapshot, ContainerState};

/// Subdomain label that always bypasses proxying
const RESERVED_LABEL: &str = "www";

/// Outcome of resolving a request hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Forward to this backend address
    Proxy(String),
    /// Not subdomain-addressed; fall through to the API and static routes
    Bypass,
    /// Subdomain named an app with no running container; carries the app name
    NotFound(String),
}

/// Extract the application label from a hostname.
///
/// Returns None (bypass) when the hostname has fewer than two dot-separated
/// labels, or the first label is empty or the reserved literal "www".
pub fn subdomain(hostname: &str) -> Option<&str> {
    let mut labels = hostname.split('.');
    let first = labels.next()?;
    labels.next()?;

    if first.is_empty() || first == RESERVED_LABEL {
        return None;
    }
    Some(first)
}

/// Resolve a hostname against a snapshot set.
///
/// A container is a candidate when its name equals the subdomain label, it is
/// running, and it has a backend address. Name uniqueness is assumed rather
/// than enforced; if duplicates exist anyway, the most recently created
/// candidate wins so the outcome does not depend on engine listing order.
pub fn resolve(hostname: &str, snapshots: &[ContainerSnapshot]) -> Resolution {
    let Some(app) = subdomain(hostname) else {
        return Resolution::Bypass;
    };

    let candidate = snapshots
        .iter()
        .filter(|s| {
            s.name == app && s.state == ContainerState::Running && s.backend_address.is_some()
        })
        .max_by_key(|s| s.created);

    match candidate.and_then(|s| s.backend_address.clone()) {
        Some(address) => Resolution::Proxy(address),
        None => Resolution::NotFound(app.to_string()),
    }
}

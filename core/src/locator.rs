//! Service name to base address table, populated by the login handshake.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Candidate base addresses per logical service (`friend`, `file`, ...).
///
/// Each list is ordered. `resolve` always picks the first candidate; the
/// remaining entries are kept as the server sent them but are never tried.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceLocator {
    services: HashMap<String, Vec<String>>,
}

impl ServiceLocator {
    pub fn new(services: HashMap<String, Vec<String>>) -> Self {
        Self { services }
    }

    /// Base address for `service`: candidate index 0.
    pub fn resolve(&self, service: &str) -> Result<&str> {
        self.services
            .get(service)
            .and_then(|candidates| candidates.first())
            .map(|base| base.trim_end_matches('/'))
            .ok_or_else(|| Error::UnknownService(service.to_string()))
    }

    pub fn candidates(&self, service: &str) -> &[String] {
        self.services.get(service).map(Vec::as_slice).unwrap_or_default()
    }

    /// True when no service has at least one candidate.
    pub fn is_empty(&self) -> bool {
        self.services.values().all(Vec::is_empty)
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}

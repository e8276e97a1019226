//! Client registry — known clients, declared capacity, and liveness.
//!
//! Liveness is advisory: `active_count` compares `last_seen` against a
//! staleness window for reporting, it never gates aggregation or evicts a
//! client from a round. The registry has no interior locking; the
//! coordinator owns it inside its single mutual-exclusion domain.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registration payload supplied by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    /// Declared local dataset cardinality (contribution weight for FedAvg)
    pub dataset_size: Option<u64>,
    /// Free-form capability tags (e.g. "gpu", "vae")
    pub capabilities: Vec<String>,
}

/// Registry entry for one known client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub client_id: String,
    pub declared_size: Option<u64>,
    pub capabilities: Vec<String>,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Known clients keyed by id.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, ClientRecord>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. Idempotent: a repeated id refreshes `last_seen`
    /// (and the declared size, when the caller supplies one) and succeeds.
    pub fn register(&mut self, client_id: &str, info: ClientInfo) {
        let now = Utc::now();
        match self.clients.get_mut(client_id) {
            Some(record) => {
                record.last_seen = now;
                if info.dataset_size.is_some() {
                    record.declared_size = info.dataset_size;
                }
            }
            None => {
                self.clients.insert(
                    client_id.to_string(),
                    ClientRecord {
                        client_id: client_id.to_string(),
                        declared_size: info.dataset_size,
                        capabilities: info.capabilities,
                        registered_at: now,
                        last_seen: now,
                    },
                );
            }
        }
    }

    /// Refresh a client's liveness timestamp. Returns false for unknown ids.
    pub fn touch(&mut self, client_id: &str) -> bool {
        match self.clients.get_mut(client_id) {
            Some(record) => {
                record.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, client_id: &str) -> Option<&ClientRecord> {
        self.clients.get(client_id)
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Clients seen within the staleness window. Reporting only.
    pub fn active_count(&self, window: Duration) -> usize {
        let now = Utc::now();
        self.clients
            .values()
            .filter(|c| now - c.last_seen < window)
            .count()
    }
}

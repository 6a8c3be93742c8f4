//! Role definition name cache.
//!
//! Entries live for the whole run; nothing is ever invalidated.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Role definition id → display name.
#[derive(Debug, Clone, Default)]
pub struct RoleNameCache {
    names: HashMap<String, String>,
    /// When the bulk load completed, if it did.
    bulk_loaded_at: Option<DateTime<Utc>>,
}

impl RoleNameCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached display name.
    pub fn get(&self, role_definition_id: &str) -> Option<&str> {
        self.names.get(role_definition_id).map(String::as_str)
    }

    /// Store a display name. Last writer wins.
    pub fn insert(&mut self, role_definition_id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(role_definition_id.into(), name.into());
    }

    /// Store a batch of definitions and mark the bulk load complete.
    pub fn extend_bulk<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.names.extend(entries);
        self.bulk_loaded_at = Some(Utc::now());
    }

    /// When the bulk load completed.
    pub fn bulk_loaded_at(&self) -> Option<DateTime<Utc>> {
        self.bulk_loaded_at
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

//! Name resolution for role definitions and principals.
//!
//! Lookups never fail the caller: a missing name degrades to the raw id.

use tracing::{debug, info, warn};

use super::cache::RoleNameCache;
use super::client::DirectoryClient;

/// Display-name lookups used while classifying.
#[allow(async_fn_in_trait)]
pub trait NameLookup {
    /// Role display name, or the raw id when it cannot be resolved. Empty id gives "".
    async fn role_name(&mut self, role_definition_id: Option<&str>) -> String;

    /// User principal name, or the raw id when it cannot be resolved. Empty id gives "".
    async fn principal_upn(&mut self, principal_id: Option<&str>) -> String;
}

/// Graph-backed lookups with a run-long role definition cache.
pub struct GraphNameLookup<'a> {
    client: &'a DirectoryClient,
    cache: RoleNameCache,
    bulk_attempted: bool,
}

impl<'a> GraphNameLookup<'a> {
    pub fn new(client: &'a DirectoryClient) -> Self {
        Self {
            client,
            cache: RoleNameCache::new(),
            bulk_attempted: false,
        }
    }

    /// Load every role definition in one go. Failure leaves per-id lookups to fill the cache.
    pub async fn preload(&mut self) {
        self.bulk_attempted = true;

        match self.client.role_definitions().await {
            Ok(definitions) => {
                self.cache.extend_bulk(
                    definitions
                        .into_iter()
                        .map(|d| (d.id, d.display_name.unwrap_or_default())),
                );
                if self.cache.is_empty() {
                    warn!("Bulk roleDefinitions returned no definitions");
                } else {
                    info!("Loaded {} role definitions", self.cache.len());
                }
            }
            Err(e) => {
                warn!(
                    "Bulk roleDefinitions failed, will fetch per role on demand: {}",
                    e
                );
            }
        }
    }

    pub fn cache(&self) -> &RoleNameCache {
        &self.cache
    }
}

impl NameLookup for GraphNameLookup<'_> {
    async fn role_name(&mut self, role_definition_id: Option<&str>) -> String {
        let id = match role_definition_id {
            Some(id) if !id.is_empty() => id,
            _ => return String::new(),
        };

        if !self.bulk_attempted {
            self.preload().await;
        }

        if let Some(name) = self.cache.get(id) {
            return name.to_string();
        }

        match self.client.role_definition(id).await {
            Ok(definition) => {
                let name = definition.display_name.unwrap_or_else(|| id.to_string());
                self.cache.insert(id, name.clone());
                name
            }
            Err(e) => {
                debug!("Role definition {} unresolved, using id: {}", id, e);
                id.to_string()
            }
        }
    }

    async fn principal_upn(&mut self, principal_id: Option<&str>) -> String {
        let id = match principal_id {
            Some(id) if !id.is_empty() => id,
            _ => return String::new(),
        };

        match self.client.user(id).await {
            Ok(user) => user.user_principal_name.unwrap_or_else(|| id.to_string()),
            Err(e) => {
                debug!("Principal {} unresolved, using id: {}", id, e);
                id.to_string()
            }
        }
    }
}

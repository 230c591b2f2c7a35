//! Endpoint tables and typed calls for each backend resource group.
//!
//! Every group declares its endpoints as `EndpointDescriptor`s (request
//! builder plus tag functions) and adds typed methods to `VitalsApi`, which
//! route through the shared `QueryStore`.

pub mod account;
pub mod line;
pub mod records;
pub mod system_configs;
pub mod users;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::api::FetchExecutor;
use crate::cache::{CacheError, EndpointRegistry, QueryStore, StoreConfig, Tag};

/// Tag kind for health records.
pub const RECORD: &str = "Record";
/// Tag kind for LINE users.
pub const USER: &str = "User";
/// Tag kind for system configs.
pub const SYSTEM_CONFIG: &str = "SystemConfig";
/// Tag kind for LINE rich menus.
pub const RICH_MENU: &str = "RichMenu";

/// Arguments of an update mutation: the target id plus the patch body.
#[derive(Debug, Serialize)]
pub(crate) struct UpdateArgs<'a, T: Serialize> {
    pub id: &'a str,
    pub data: &'a T,
}

/// All endpoints of the backend in one table.
pub fn registry() -> Result<EndpointRegistry, CacheError> {
    let mut registry = EndpointRegistry::new();
    registry.register_all(account::endpoints())?;
    registry.register_all(users::endpoints())?;
    registry.register_all(records::endpoints())?;
    registry.register_all(line::endpoints())?;
    registry.register_all(system_configs::endpoints())?;
    Ok(registry)
}

/// Typed facade over the query store.
/// Clone is cheap; clones share the same cache.
#[derive(Clone)]
pub struct VitalsApi {
    store: QueryStore,
}

impl VitalsApi {
    pub fn new(store: QueryStore) -> Self {
        Self { store }
    }

    /// Build a store with the full endpoint table over `executor`.
    pub fn connect(executor: Arc<dyn FetchExecutor>, config: StoreConfig) -> Result<Self, CacheError> {
        Ok(Self::new(QueryStore::init(executor, registry()?, config)))
    }

    pub fn store(&self) -> &QueryStore {
        &self.store
    }

    pub fn dispose(&self) {
        self.store.dispose();
    }
}

/// `[{kind, LIST}, {kind, <field>}...]` for a list result.
pub(crate) fn list_tags(kind: &str, result: &Value, id_field: &str) -> Vec<Tag> {
    let mut tags = vec![Tag::list(kind)];
    if let Some(items) = result.as_array() {
        tags.extend(
            items
                .iter()
                .filter_map(|item| item.get(id_field).and_then(Value::as_str))
                .map(|id| Tag::id(kind, id)),
        );
    }
    tags
}

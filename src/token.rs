/*
 *  token.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Authorization token from the companion device
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

pub const TOKEN_CAPABILITY: &str = "retrieve_jwt";
pub const TOKEN_PATH: &str = "/jwt";
pub const TOKEN_KEY: &str = "net.mymicds.watchface.jwt";

const ITEM_SCHEME: &str = "wear";
const EVENT_BACKLOG: usize = 16;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("companion channel error: {0}")]
    Channel(String),
}

/// Bearer token for the schedule service. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(<{} chars>)", self.0.len())
    }
}

/// Where and under which key the companion keeps the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSettings {
    pub capability: String,
    pub path: String,
    pub key: String,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            capability: TOKEN_CAPABILITY.to_string(),
            path: TOKEN_PATH.to_string(),
            key: TOKEN_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionNode {
    pub id: String,
    pub display_name: String,
}

/// `wear://<node>/<path>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemAddress {
    pub node: String,
    pub path: String,
}

impl ItemAddress {
    pub fn new(node: impl Into<String>, path: impl Into<String>) -> Self {
        Self { node: node.into(), path: path.into() }
    }
}

impl fmt::Display for ItemAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", ITEM_SCHEME, self.node, self.path)
    }
}

/// A key/value item held by a companion node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    pub address: ItemAddress,
    pub fields: HashMap<String, String>,
}

impl DataItem {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEvent {
    Changed(DataItem),
    Deleted(ItemAddress),
}

/// Companion data layer: node discovery, item fetch and change events.
#[async_trait]
pub trait TokenChannel: Send + Sync {
    async fn discover(&self, capability: &str) -> Result<Vec<CompanionNode>, TokenError>;

    async fn fetch(&self, address: &ItemAddress) -> Result<Option<DataItem>, TokenError>;

    fn subscribe(&self) -> broadcast::Receiver<DataEvent>;
}

/// Reads the token out of an item stored at the token path.
pub fn token_from_item(item: &DataItem, settings: &TokenSettings) -> Option<AuthToken> {
    if item.address.path != settings.path {
        return None;
    }
    item.get(&settings.key)
        .filter(|v| !v.is_empty())
        .map(AuthToken::new)
}

/// One-shot acquisition: first capable node, then its token item.
/// `Ok(None)` when no node serves a token or the item holds none.
pub async fn acquire_token(
    channel: &dyn TokenChannel,
    settings: &TokenSettings,
) -> Result<Option<AuthToken>, TokenError> {
    let nodes = channel.discover(&settings.capability).await?;
    let Some(node) = nodes.first() else {
        info!("No companion node advertises '{}'", settings.capability);
        return Ok(None);
    };

    let address = ItemAddress::new(node.id.clone(), settings.path.clone());
    debug!("Fetching token from {} ({})", address, node.display_name);
    let token = channel
        .fetch(&address)
        .await?
        .and_then(|item| token_from_item(&item, settings));

    if token.is_none() {
        warn!("{} holds no '{}'", address, settings.key);
    }
    Ok(token)
}

#[derive(Default)]
struct LocalStore {
    nodes: Vec<CompanionNode>,
    capabilities: HashMap<String, Vec<String>>,
    items: HashMap<ItemAddress, DataItem>,
}

/// In-process companion: a node table plus an item store that broadcasts
/// every change to subscribers.
#[derive(Clone)]
pub struct LocalTokenChannel {
    store: Arc<RwLock<LocalStore>>,
    events: broadcast::Sender<DataEvent>,
}

impl Default for LocalTokenChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalTokenChannel {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BACKLOG);
        Self {
            store: Arc::new(RwLock::new(LocalStore::default())),
            events,
        }
    }

    /// Registers `node` as serving `capability`.
    pub fn add_node(&self, node: CompanionNode, capability: &str) {
        if let Ok(mut store) = self.store.write() {
            store
                .capabilities
                .entry(capability.to_string())
                .or_default()
                .push(node.id.clone());
            store.nodes.push(node);
        }
    }

    /// Stores `item` and tells subscribers about it.
    pub fn put(&self, item: DataItem) {
        if let Ok(mut store) = self.store.write() {
            store.items.insert(item.address.clone(), item.clone());
        }
        // no subscribers is fine
        let _ = self.events.send(DataEvent::Changed(item));
    }

    pub fn delete(&self, address: &ItemAddress) {
        let removed = self
            .store
            .write()
            .map(|mut store| store.items.remove(address).is_some())
            .unwrap_or(false);
        if removed {
            let _ = self.events.send(DataEvent::Deleted(address.clone()));
        }
    }

    /// Convenience for the token item itself.
    pub fn put_token(&self, node: &str, settings: &TokenSettings, value: &str) {
        let mut fields = HashMap::new();
        fields.insert(settings.key.clone(), value.to_string());
        self.put(DataItem {
            address: ItemAddress::new(node, settings.path.clone()),
            fields,
        });
    }
}

#[async_trait]
impl TokenChannel for LocalTokenChannel {
    async fn discover(&self, capability: &str) -> Result<Vec<CompanionNode>, TokenError> {
        let store = self
            .store
            .read()
            .map_err(|e| TokenError::Channel(e.to_string()))?;
        let ids = store.capabilities.get(capability).cloned().unwrap_or_default();
        Ok(store
            .nodes
            .iter()
            .filter(|n| ids.contains(&n.id))
            .cloned()
            .collect())
    }

    async fn fetch(&self, address: &ItemAddress) -> Result<Option<DataItem>, TokenError> {
        let store = self
            .store
            .read()
            .map_err(|e| TokenError::Channel(e.to_string()))?;
        Ok(store.items.get(address).cloned())
    }

    fn subscribe(&self) -> broadcast::Receiver<DataEvent> {
        self.events.subscribe()
    }
}

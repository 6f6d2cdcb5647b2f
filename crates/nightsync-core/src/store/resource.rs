// ── Resource store ──
//
// Latest-value cache for one named resource, with a trigger that asks
// the fetch pipeline for a new value. One `watch` channel per store;
// every publication notifies each live subscriber once.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Notify, watch};
use tracing::{debug, warn};

use super::session::SessionStorage;
use crate::error::CoreError;
use crate::stream::ResourceStream;

/// Where a store's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Fetched from the active device; cleared on device switch.
    Device,
    /// Edited on this host and kept in session storage.
    Local,
}

/// Session storage slot a local store writes through to.
#[derive(Debug, Clone)]
struct Persist {
    storage: SessionStorage,
    key: String,
}

pub struct ResourceStore<T> {
    name: String,
    origin: Origin,
    value: watch::Sender<Option<Arc<T>>>,
    trigger: Notify,
    persist: Option<Persist>,
}

impl<T> fmt::Debug for ResourceStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStore")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("has_value", &self.value.borrow().is_some())
            .finish_non_exhaustive()
    }
}

impl<T> ResourceStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// An empty store for a device resource.
    pub fn device(name: impl Into<String>) -> Self {
        Self::build(name.into(), Origin::Device, None, None)
    }

    /// A local store seeded with `initial`, written through to `storage`
    /// under `key` on every change.
    pub fn local(name: impl Into<String>, initial: T, storage: SessionStorage, key: &str) -> Self {
        let persist = Persist {
            storage,
            key: key.to_owned(),
        };
        Self::build(name.into(), Origin::Local, Some(Arc::new(initial)), Some(persist))
    }

    fn build(name: String, origin: Origin, initial: Option<Arc<T>>, persist: Option<Persist>) -> Self {
        let (value, _) = watch::channel(initial);
        Self {
            name,
            origin,
            value,
            trigger: Notify::new(),
            persist,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn current(&self) -> Option<Arc<T>> {
        self.value.borrow().clone()
    }

    pub fn subscribe(&self) -> ResourceStream<T> {
        ResourceStream::new(self.value.subscribe())
    }

    pub fn receiver(&self) -> watch::Receiver<Option<Arc<T>>> {
        self.value.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.value.receiver_count()
    }

    /// Replace the cached value and notify every subscriber.
    ///
    /// Local stores also write the value through to session storage;
    /// a storage failure is logged and the cache keeps the new value.
    pub fn publish(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.value.send_replace(Some(Arc::clone(&value)));
        debug!(store = %self.name, subscribers = self.value.receiver_count(), "published");
        if let Some(persist) = &self.persist {
            if let Err(e) = persist.storage.store_json(&persist.key, value.as_ref()) {
                warn!(store = %self.name, error = %e, "session write failed");
            }
        }
        value
    }

    /// Put back a previously observed value (or nothing) without persisting.
    pub fn restore(&self, previous: Option<Arc<T>>) {
        self.value.send_replace(previous);
    }

    /// Put back `previous` only while the store still holds `expected`.
    ///
    /// Returns `false` when something newer was published in between; that
    /// value is left in place.
    pub fn restore_if_current(&self, expected: &Arc<T>, previous: Option<Arc<T>>) -> bool {
        self.value.send_if_modified(|slot| {
            let unchanged = slot.as_ref().is_some_and(|held| Arc::ptr_eq(held, expected));
            if unchanged {
                *slot = previous;
            }
            unchanged
        })
    }

    /// Forget the cached value.
    pub fn clear(&self) {
        self.value.send_replace(None);
    }

    /// Ask the fetch pipeline for a new value. Requests made while a fetch
    /// is outstanding collapse into a single follow-up fetch.
    pub fn refresh(&self) {
        self.trigger.notify_one();
    }

    /// Resolves when a refresh has been requested.
    pub async fn triggered(&self) {
        self.trigger.notified().await;
    }
}

// ── Type-erased handle ───────────────────────────────────────────────

/// Object-safe view of a store, used by the registry.
pub trait StoreHandle: Send + Sync {
    fn name(&self) -> &str;
    fn origin(&self) -> Origin;
    fn refresh(&self);
    fn clear(&self);
    fn snapshot_json(&self) -> Option<Value>;
    /// Decode `value` and publish it.
    fn publish_json(&self, value: Value) -> Result<(), CoreError>;
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T> StoreHandle for ResourceStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    fn refresh(&self) {
        ResourceStore::refresh(self);
    }

    fn clear(&self) {
        ResourceStore::clear(self);
    }

    fn snapshot_json(&self) -> Option<Value> {
        let current = self.current()?;
        serde_json::to_value(current.as_ref()).ok()
    }

    fn publish_json(&self, value: Value) -> Result<(), CoreError> {
        let typed: T = serde_json::from_value(value).map_err(|e| CoreError::InvalidValue {
            field: self.name.clone(),
            reason: e.to_string(),
        })?;
        self.publish(typed);
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

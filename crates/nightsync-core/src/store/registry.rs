// ── Store registry ──
//
// Process-scoped table of resource stores keyed by name. Entries are
// created once and never replaced; only their values change. The registry
// also holds the gateway of the active device so the write-back path and
// the facade share one view of "which device".

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::StoreName;
use super::resource::{Origin, ResourceStore, StoreHandle};
use super::writeback::{ConfigWriteBack, WriteOutcome};
use crate::bus::EventBus;
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::model::Configuration;

pub struct StoreRegistry {
    stores: DashMap<String, Arc<dyn StoreHandle>>,
    gateway: ArcSwapOption<Gateway>,
    write_back: ConfigWriteBack,
    bus: EventBus,
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.names())
            .field("attached", &self.gateway.load().is_some())
            .finish_non_exhaustive()
    }
}

impl StoreRegistry {
    pub fn new(bus: EventBus) -> Self {
        Self {
            stores: DashMap::new(),
            gateway: ArcSwapOption::empty(),
            write_back: ConfigWriteBack::new(),
            bus,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    // ── Lookup ───────────────────────────────────────────────────────

    /// The store registered under `name`, if it holds values of type `T`.
    pub fn get_store<T>(&self, name: &str) -> Option<Arc<ResourceStore<T>>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.store(name).ok()
    }

    /// Like [`get_store`](Self::get_store), distinguishing a missing store
    /// from one of another type.
    pub fn store<T>(&self, name: &str) -> Result<Arc<ResourceStore<T>>, CoreError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let handle = self
            .stores
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CoreError::UnknownStore { name: name.into() })?;
        downcast(name, handle)
    }

    /// Register `store` under its name. The first registration wins: a
    /// later call returns the existing store and drops the new one.
    pub fn set_store<T>(&self, store: ResourceStore<T>) -> Result<Arc<ResourceStore<T>>, CoreError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let name = store.name().to_owned();
        match self.stores.entry(name.clone()) {
            Entry::Occupied(existing) => {
                let handle = Arc::clone(existing.get());
                drop(existing);
                downcast(&name, handle)
            }
            Entry::Vacant(slot) => {
                let store = Arc::new(store);
                let handle: Arc<dyn StoreHandle> = store.clone();
                slot.insert(handle);
                debug!(store = %name, "registered");
                Ok(store)
            }
        }
    }

    /// Typed handle for one of the well-known stores.
    pub fn named<T>(&self, name: StoreName) -> Result<Arc<ResourceStore<T>>, CoreError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.store(name.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn snapshot_json(&self, name: &str) -> Result<Option<Value>, CoreError> {
        Ok(self.handle(name)?.snapshot_json())
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Re-fire the store's trigger.
    pub fn refresh(&self, name: &str) -> Result<(), CoreError> {
        self.handle(name)?.refresh();
        Ok(())
    }

    /// Push a locally originated value into the store.
    ///
    /// For the device configuration this goes through the write-back path;
    /// every other store just publishes the value.
    pub async fn update(&self, name: &str, value: Value) -> Result<(), CoreError> {
        if name == StoreName::Configuration.as_ref() {
            let config: Configuration =
                serde_json::from_value(value).map_err(|e| CoreError::InvalidValue {
                    field: name.into(),
                    reason: e.to_string(),
                })?;
            self.write_configuration(config).await?;
            return Ok(());
        }
        self.handle(name)?.publish_json(value)
    }

    /// Write a configuration document to the active device.
    pub async fn write_configuration(&self, config: Configuration) -> Result<WriteOutcome, CoreError> {
        let gateway = self.gateway().ok_or(CoreError::NoDeviceSelected)?;
        let store = self.named::<Configuration>(StoreName::Configuration)?;
        self.write_back.write(&gateway, &store, config).await
    }

    // ── Active device ────────────────────────────────────────────────

    pub fn gateway(&self) -> Option<Arc<Gateway>> {
        self.gateway.load_full()
    }

    /// Switch the active device. Device-origin caches and write history are
    /// cleared; local stores keep their values.
    pub fn attach(&self, gateway: Option<Arc<Gateway>>) {
        self.gateway.store(gateway);
        self.write_back.reset();
        for entry in &self.stores {
            if entry.value().origin() == Origin::Device {
                entry.value().clear();
            }
        }
    }

    fn handle(&self, name: &str) -> Result<Arc<dyn StoreHandle>, CoreError> {
        self.stores
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CoreError::UnknownStore { name: name.into() })
    }
}

fn downcast<T>(name: &str, handle: Arc<dyn StoreHandle>) -> Result<Arc<ResourceStore<T>>, CoreError>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    handle
        .as_any()
        .downcast::<ResourceStore<T>>()
        .map_err(|_| CoreError::TypeMismatch { name: name.into() })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::{EffectList, SiteOptions};
    use crate::store::session::{SITE_CONFIG_KEY, SessionStorage};

    fn registry() -> StoreRegistry {
        StoreRegistry::new(EventBus::new())
    }

    #[test]
    fn first_registration_wins() {
        let reg = registry();
        let first = reg
            .set_store(ResourceStore::<Value>::device("IESPState"))
            .unwrap();
        first.publish(json!({"fps": 1}));

        let second = reg
            .set_store(ResourceStore::<Value>::device("IESPState"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.current().unwrap()["fps"], 1);
    }

    #[test]
    fn lookup_checks_type() {
        let reg = registry();
        reg.set_store(ResourceStore::<EffectList>::device("IEffects"))
            .unwrap();

        assert!(reg.get_store::<EffectList>("IEffects").is_some());
        assert!(reg.get_store::<Value>("IEffects").is_none());
        assert!(matches!(
            reg.store::<Value>("IEffects"),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert!(matches!(
            reg.store::<Value>("missing"),
            Err(CoreError::UnknownStore { .. })
        ));
        assert!(matches!(
            reg.set_store(ResourceStore::<Value>::device("IEffects")),
            Err(CoreError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn update_publishes_local_value() {
        let reg = registry();
        let storage = SessionStorage::in_memory();
        let site = reg
            .set_store(ResourceStore::local(
                "SiteSettings",
                SiteOptions::default(),
                storage.clone(),
                SITE_CONFIG_KEY,
            ))
            .unwrap();

        let mut value = serde_json::to_value(SiteOptions::default()).unwrap();
        value["UIMode"]["value"] = json!("light");
        reg.update("SiteSettings", value).await.unwrap();

        assert_eq!(site.current().unwrap().ui_mode(), "light");
        assert!(storage.get(SITE_CONFIG_KEY).unwrap().contains("light"));
    }

    #[tokio::test]
    async fn configuration_update_needs_a_device() {
        let reg = registry();
        reg.set_store(ResourceStore::<Configuration>::device(
            StoreName::Configuration.as_ref(),
        ))
        .unwrap();

        let err = reg
            .update("INightDriverConfiguration", json!({"brightness": 10}))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoDeviceSelected));
    }

    #[test]
    fn attach_clears_device_values_only() {
        let reg = registry();
        let effects = reg
            .set_store(ResourceStore::<Value>::device("IEffects"))
            .unwrap();
        let site = reg
            .set_store(ResourceStore::local(
                "SiteSettings",
                SiteOptions::default(),
                SessionStorage::in_memory(),
                SITE_CONFIG_KEY,
            ))
            .unwrap();
        effects.publish(json!({}));

        reg.attach(None);

        assert!(effects.current().is_none());
        assert!(site.current().is_some());
    }

    #[test]
    fn refresh_unknown_store_fails() {
        assert!(matches!(
            registry().refresh("nope"),
            Err(CoreError::UnknownStore { .. })
        ));
    }
}

// ── Device facade ──
//
// Scoped view over the registry for one consumer: read-only subscriptions
// to the stores it asked for, refresh/update on those stores, and the
// effect navigation commands. The facade always talks to whichever device
// is currently attached to the registry.

use std::sync::Arc;
use std::time::Duration;

use nightsync_api::{Method, RequestBody};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{Configuration, SettingValue};
use crate::store::{StoreName, StoreRegistry, WriteOutcome};
use crate::stream::ResourceStream;

#[derive(Debug, Clone)]
pub struct Device {
    registry: Arc<StoreRegistry>,
    scope: Vec<StoreName>,
}

impl Device {
    pub fn new(registry: Arc<StoreRegistry>, scope: &[StoreName]) -> Self {
        Self {
            registry,
            scope: scope.to_vec(),
        }
    }

    /// Facade over every registered store.
    pub fn unscoped(registry: Arc<StoreRegistry>) -> Self {
        use strum::IntoEnumIterator;
        let scope: Vec<StoreName> = StoreName::iter().collect();
        Self { registry, scope }
    }

    pub fn scope(&self) -> &[StoreName] {
        &self.scope
    }

    /// Display name of the attached device.
    pub fn short_name(&self) -> Option<String> {
        self.registry
            .gateway()
            .map(|gateway| gateway.client().address().short_name())
    }

    fn check_scope(&self, name: StoreName) -> Result<(), CoreError> {
        if self.scope.contains(&name) {
            Ok(())
        } else {
            Err(CoreError::OutOfScope {
                name: name.to_string(),
            })
        }
    }

    // ── Store access ─────────────────────────────────────────────────

    /// Read-only subscription to a store in scope.
    pub fn subscribe<T>(&self, name: StoreName) -> Result<ResourceStream<T>, CoreError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.check_scope(name)?;
        Ok(self.registry.named::<T>(name)?.subscribe())
    }

    /// Latest value of a store in scope, if it has one.
    pub fn current<T>(&self, name: StoreName) -> Result<Option<Arc<T>>, CoreError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.check_scope(name)?;
        Ok(self.registry.named::<T>(name)?.current())
    }

    /// Wait until a store in scope holds a value.
    pub async fn wait_for<T>(&self, name: StoreName, timeout: Duration) -> Result<Arc<T>, CoreError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let mut stream = self.subscribe::<T>(name)?;
        if let Some(value) = stream.current() {
            return Ok(Arc::clone(value));
        }
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        tokio::time::timeout(timeout, stream.next_value())
            .await
            .map_err(|_| CoreError::Timeout { timeout_ms })?
            .ok_or(CoreError::NoDeviceSelected)
    }

    pub fn refresh(&self, name: StoreName) -> Result<(), CoreError> {
        self.check_scope(name)?;
        self.registry.refresh(name.as_ref())
    }

    /// Push a local value into a writable store in scope.
    pub async fn update(&self, name: StoreName, value: Value) -> Result<(), CoreError> {
        self.check_scope(name)?;
        if !name.is_writable() {
            return Err(CoreError::ReadOnly {
                name: name.to_string(),
            });
        }
        self.registry.update(name.as_ref(), value).await
    }

    /// Change one configuration key and write the result back.
    pub async fn update_setting(
        &self,
        key: &str,
        value: SettingValue,
    ) -> Result<WriteOutcome, CoreError> {
        let mut patch = Configuration::new();
        patch.insert(key, value);
        self.patch_configuration(patch).await
    }

    /// Merge `patch` into the cached configuration and write it back.
    pub async fn patch_configuration(
        &self,
        patch: Configuration,
    ) -> Result<WriteOutcome, CoreError> {
        self.check_scope(StoreName::Configuration)?;
        let mut config = self
            .registry
            .named::<Configuration>(StoreName::Configuration)?
            .current()
            .map(|current| current.as_ref().clone())
            .unwrap_or_default();
        config.merge(patch);
        self.registry.write_configuration(config).await
    }

    // ── Effect commands ──────────────────────────────────────────────

    /// Advance (`up`) or retreat the running effect.
    pub async fn navigate(&self, up: bool) -> Result<(), CoreError> {
        let path = if up { "/nextEffect" } else { "/previousEffect" };
        self.command(path, RequestBody::Empty, "navigate").await
    }

    /// Jump to the effect at `index`.
    pub async fn navigate_to(&self, index: usize) -> Result<(), CoreError> {
        self.command(
            "/currentEffect",
            RequestBody::field("currentEffectIndex", index),
            "navigateTo",
        )
        .await
    }

    /// Flip the effect at `index`: an effect that is `currently_enabled`
    /// gets disabled, otherwise it gets enabled.
    pub async fn toggle_effect(&self, index: usize, currently_enabled: bool) -> Result<(), CoreError> {
        let path = if currently_enabled {
            "/disableEffect"
        } else {
            "/enableEffect"
        };
        self.command(path, RequestBody::field("effectIndex", index), "effectEnable")
            .await
    }

    /// POST a command; on success refresh the effect list. On failure the
    /// cache is left untouched.
    async fn command(&self, path: &str, body: RequestBody, label: &str) -> Result<(), CoreError> {
        let gateway = self.registry.gateway().ok_or(CoreError::NoDeviceSelected)?;

        let Some(resp) = gateway.request(Method::POST, path, body, label).await else {
            warn!(label, path, "device command failed");
            return Err(CoreError::RequestFailed {
                operation: label.into(),
            });
        };

        let status = resp.status();
        if !status.is_success() {
            warn!(label, path, status = status.as_u16(), "device rejected command");
            return Err(CoreError::Rejected {
                operation: label.into(),
                status: status.as_u16(),
            });
        }

        debug!(label, path, "command accepted, refreshing effects");
        self.registry.refresh(StoreName::Effects.as_ref())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::bus::EventBus;
    use crate::model::{EffectList, SiteOptions};
    use crate::store::ResourceStore;
    use crate::store::session::{SITE_CONFIG_KEY, SessionStorage};

    fn registry() -> Arc<StoreRegistry> {
        let reg = StoreRegistry::new(EventBus::new());
        reg.set_store(ResourceStore::<EffectList>::device("IEffects"))
            .unwrap();
        reg.set_store(ResourceStore::<Configuration>::device(
            "INightDriverConfiguration",
        ))
        .unwrap();
        reg.set_store(ResourceStore::local(
            "SiteSettings",
            SiteOptions::default(),
            SessionStorage::in_memory(),
            SITE_CONFIG_KEY,
        ))
        .unwrap();
        Arc::new(reg)
    }

    #[test]
    fn scope_limits_subscriptions() {
        let device = Device::new(registry(), &[StoreName::Effects]);
        assert!(device.subscribe::<EffectList>(StoreName::Effects).is_ok());
        assert!(matches!(
            device.subscribe::<Configuration>(StoreName::Configuration),
            Err(CoreError::OutOfScope { .. })
        ));
        assert!(matches!(
            device.refresh(StoreName::Configuration),
            Err(CoreError::OutOfScope { .. })
        ));
    }

    #[tokio::test]
    async fn device_stores_are_read_only() {
        let device = Device::new(registry(), &[StoreName::Effects]);
        let err = device
            .update(StoreName::Effects, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ReadOnly { .. }));
    }

    #[tokio::test]
    async fn site_settings_update_in_scope() {
        let device = Device::new(registry(), &[StoreName::SiteSettings]);
        let mut value = serde_json::to_value(SiteOptions::default()).unwrap();
        value["maxSamples"]["value"] = json!(20);
        device.update(StoreName::SiteSettings, value).await.unwrap();

        let site = device
            .current::<SiteOptions>(StoreName::SiteSettings)
            .unwrap()
            .unwrap();
        assert_eq!(site.max_samples(), 20);
    }

    #[tokio::test]
    async fn commands_need_a_device() {
        let device = Device::new(registry(), &[StoreName::Effects]);
        assert!(matches!(
            device.navigate(true).await,
            Err(CoreError::NoDeviceSelected)
        ));
        assert!(device.short_name().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_times_out() {
        let device = Device::new(registry(), &[StoreName::Effects]);
        let err = device
            .wait_for::<EffectList>(StoreName::Effects, Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Timeout { timeout_ms: 500 }));
    }
}

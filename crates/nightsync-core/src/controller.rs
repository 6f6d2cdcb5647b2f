// ── Controller ──
//
// Owns the process-scoped context (bus, registry, session storage) and
// the lifecycle of the active device: selecting a device starts the
// fetch pipelines, pollers, and bus command handlers; deselecting stops
// them and clears device-origin caches.

use std::sync::Arc;

use nightsync_api::{DeviceAddress, DeviceClient};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{BusPayload, EventBus, SubscriptionSet, channel};
use crate::config::ControllerConfig;
use crate::device::Device;
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::model::{
    Configuration, DeviceStatistics, EffectList, EffectSettings, SettingSpec, SiteOptions,
};
use crate::store::pipeline::run_pipeline;
use crate::store::session::{EFFECT_CONFIG_KEY, LEGACY_EFFECT_CONFIG_KEY, SITE_CONFIG_KEY};
use crate::store::{ResourceStore, SessionStorage, StoreName, StoreRegistry};
use crate::timing::{IDLE_PROGRESS, poll_effects, poll_statistics, track_progress};

/// Stores fed from the device.
const DEVICE_STORES: [StoreName; 4] = [
    StoreName::Configuration,
    StoreName::ConfigurationSpecs,
    StoreName::Effects,
    StoreName::Statistics,
];

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    bus: EventBus,
    registry: Arc<StoreRegistry>,
    session: SessionStorage,
    active: watch::Sender<Option<DeviceAddress>>,
    cancel: CancellationToken,
    /// Child token for the selected device, replaced on every selection.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Bus command handlers for the selected device.
    commands: Mutex<Option<SubscriptionSet>>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("active", &*self.inner.active.borrow())
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Create a controller and register every store. Does not contact a
    /// device; call [`select()`](Self::select) or [`start()`](Self::start).
    pub fn new(config: ControllerConfig) -> Result<Self, CoreError> {
        let session = match &config.session_path {
            Some(path) => SessionStorage::open(path)?,
            None => SessionStorage::in_memory(),
        };
        let bus = EventBus::new();
        let registry = Arc::new(StoreRegistry::new(bus.clone()));

        registry.set_store(ResourceStore::<Configuration>::device(
            StoreName::Configuration.as_ref(),
        ))?;
        registry.set_store(ResourceStore::<Vec<SettingSpec>>::device(
            StoreName::ConfigurationSpecs.as_ref(),
        ))?;
        registry.set_store(ResourceStore::<EffectList>::device(
            StoreName::Effects.as_ref(),
        ))?;
        registry.set_store(ResourceStore::<DeviceStatistics>::device(
            StoreName::Statistics.as_ref(),
        ))?;

        let site: SiteOptions = session.load_json(&[SITE_CONFIG_KEY]).unwrap_or_default();
        registry.set_store(ResourceStore::local(
            StoreName::SiteSettings.as_ref(),
            site,
            session.clone(),
            SITE_CONFIG_KEY,
        ))?;
        let effect_settings: EffectSettings = session
            .load_json(&[EFFECT_CONFIG_KEY, LEGACY_EFFECT_CONFIG_KEY])
            .unwrap_or_default();
        registry.set_store(ResourceStore::local(
            StoreName::EffectSettings.as_ref(),
            effect_settings,
            session.clone(),
            EFFECT_CONFIG_KEY,
        ))?;

        let (active, _) = watch::channel(None);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                bus,
                registry,
                session,
                active,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
                commands: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.inner.registry
    }

    pub fn session(&self) -> &SessionStorage {
        &self.inner.session
    }

    /// Facade limited to `scope`.
    pub fn device(&self, scope: &[StoreName]) -> Device {
        Device::new(Arc::clone(&self.inner.registry), scope)
    }

    /// Observe which device is selected.
    pub fn active_device(&self) -> watch::Receiver<Option<DeviceAddress>> {
        self.inner.active.subscribe()
    }

    // ── Device lifecycle ─────────────────────────────────────────

    /// Select the device named in the configuration, if any.
    pub async fn start(&self) -> Result<(), CoreError> {
        match self.inner.config.device.clone() {
            Some(address) => self.select(address).await,
            None => Ok(()),
        }
    }

    /// Make `address` the active device.
    ///
    /// Stops the previous device's tasks, clears device caches, then starts
    /// a pipeline per device store, fires the initial fetches, and spawns
    /// the pollers and bus command handlers.
    pub async fn select(&self, address: DeviceAddress) -> Result<(), CoreError> {
        self.deselect().await;

        let client = DeviceClient::new(address.clone(), &self.inner.config.transport())?;
        let gateway = Arc::new(Gateway::new(client, self.inner.bus.clone()));
        self.inner.registry.attach(Some(Arc::clone(&gateway)));

        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        {
            let mut handles = self.inner.task_handles.lock().await;
            handles.push(self.spawn_pipeline::<Configuration>(StoreName::Configuration, &gateway, &child)?);
            handles.push(self.spawn_pipeline::<Vec<SettingSpec>>(StoreName::ConfigurationSpecs, &gateway, &child)?);
            handles.push(self.spawn_pipeline::<EffectList>(StoreName::Effects, &gateway, &child)?);
            handles.push(self.spawn_pipeline::<DeviceStatistics>(StoreName::Statistics, &gateway, &child)?);

            for name in DEVICE_STORES {
                self.inner.registry.refresh(name.as_ref())?;
            }

            let effects = self.inner.registry.named::<EffectList>(StoreName::Effects)?;
            let statistics = self
                .inner
                .registry
                .named::<DeviceStatistics>(StoreName::Statistics)?;
            let site = self
                .inner
                .registry
                .named::<SiteOptions>(StoreName::SiteSettings)?;

            if self.inner.config.poll_effects {
                handles.push(tokio::spawn(poll_effects(effects, child.clone())));
            }
            if self.inner.config.poll_statistics {
                handles.push(tokio::spawn(poll_statistics(
                    Arc::clone(&statistics),
                    site,
                    child.clone(),
                )));
            }
            handles.push(tokio::spawn(statistics_fanout(
                statistics,
                self.inner.bus.clone(),
                child.clone(),
            )));
        }

        *self.inner.commands.lock().await = Some(self.subscribe_commands());

        self.inner.active.send_replace(Some(address.clone()));
        info!(device = %address, "device selected");
        Ok(())
    }

    /// Stop all device tasks and forget device-origin values.
    pub async fn deselect(&self) {
        self.inner.cancel_child.lock().await.cancel();
        // Dropping the set unsubscribes every handler.
        self.inner.commands.lock().await.take();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.inner.registry.attach(None);
        if self.inner.active.send_replace(None).is_some() {
            debug!("device deselected");
        }
    }

    /// Deselect and cancel everything this controller spawned.
    pub async fn shutdown(&self) {
        self.deselect().await;
        self.inner.cancel.cancel();
    }

    /// Progress of the running effect, for one slot or the list as a whole.
    ///
    /// Requires a selected device. The tracker lives until that device is
    /// deselected, after which the receiver reports closed.
    pub async fn effect_progress(
        &self,
        slot: Option<usize>,
    ) -> Result<watch::Receiver<f64>, CoreError> {
        if self.inner.active.borrow().is_none() {
            return Err(CoreError::NoDeviceSelected);
        }
        let effects = self.inner.registry.named::<EffectList>(StoreName::Effects)?;
        let (tx, rx) = watch::channel(IDLE_PROGRESS);
        let cancel = self.inner.cancel_child.lock().await.clone();
        let handle = tokio::spawn(track_progress(
            effects,
            slot,
            tx,
            self.inner.config.tick_interval,
            cancel,
        ));
        self.inner.task_handles.lock().await.push(handle);
        Ok(rx)
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// Create, select the configured device, run `f`, shut down.
    ///
    /// Polling is disabled: a single invocation only needs the initial
    /// fetches and any refreshes its own commands trigger.
    pub async fn oneshot<F, Fut, T, E>(config: ControllerConfig, f: F) -> Result<T, E>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        let mut cfg = config;
        cfg.poll_effects = false;
        cfg.poll_statistics = false;

        let controller = Controller::new(cfg)?;
        controller.start().await?;
        let result = f(controller.clone()).await;
        controller.shutdown().await;
        result
    }

    // ── Internals ────────────────────────────────────────────────

    fn spawn_pipeline<T>(
        &self,
        name: StoreName,
        gateway: &Arc<Gateway>,
        cancel: &CancellationToken,
    ) -> Result<JoinHandle<()>, CoreError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let endpoint = name.endpoint().ok_or_else(|| CoreError::Config {
            message: format!("{name} has no device endpoint"),
        })?;
        let store = self.inner.registry.named::<T>(name)?;
        Ok(tokio::spawn(run_pipeline(
            Arc::clone(gateway),
            store,
            endpoint,
            self.inner.config.retry.clone(),
            cancel.clone(),
        )))
    }

    /// Route command channels on the bus to the facade. Handlers run
    /// synchronously inside `emit`, so each command is spawned.
    fn subscribe_commands(&self) -> SubscriptionSet {
        let bus = &self.inner.bus;
        let runtime = Handle::current();
        let device = Device::unscoped(Arc::clone(&self.inner.registry));
        let mut subs = SubscriptionSet::new(bus.clone());

        subs.push(bus.subscribe(channel::NAVIGATE, {
            let (device, runtime) = (device.clone(), runtime.clone());
            move |payload| {
                let up = payload
                    .as_json()
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                let device = device.clone();
                runtime.spawn(async move {
                    let _ = device.navigate(up).await;
                });
            }
        }));

        subs.push(bus.subscribe(channel::NAVIGATE_TO, {
            let (device, runtime) = (device.clone(), runtime.clone());
            move |payload| {
                let Some(index) = payload_index(payload) else {
                    warn!(?payload, "navigateTo without an index");
                    return;
                };
                let device = device.clone();
                runtime.spawn(async move {
                    let _ = device.navigate_to(index).await;
                });
            }
        }));

        subs.push(bus.subscribe(channel::TOGGLE_EFFECT, {
            let (device, runtime) = (device.clone(), runtime.clone());
            move |payload| {
                let Some(index) = payload_index(payload) else {
                    warn!(?payload, "toggleEffect without an index");
                    return;
                };
                let enabled = payload
                    .as_json()
                    .and_then(|v| v.get("enabled"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let device = device.clone();
                runtime.spawn(async move {
                    let _ = device.toggle_effect(index, enabled).await;
                });
            }
        }));

        subs.push(bus.subscribe(channel::SET_CHIP_CONFIG, {
            let (device, runtime) = (device.clone(), runtime.clone());
            move |payload| {
                let patch = payload
                    .as_json()
                    .cloned()
                    .map(serde_json::from_value::<Configuration>);
                let Some(Ok(patch)) = patch else {
                    warn!(?payload, "SetChipConfig payload is not a configuration object");
                    return;
                };
                let device = device.clone();
                runtime.spawn(async move {
                    if let Err(e) = device.patch_configuration(patch).await {
                        warn!(error = %e, "SetChipConfig failed");
                    }
                });
            }
        }));

        for (name, store) in [
            (channel::REFRESH_EFFECT_LIST, StoreName::Effects),
            (channel::REFRESH_STATISTICS, StoreName::Statistics),
        ] {
            let registry = Arc::clone(&self.inner.registry);
            subs.push(bus.subscribe(name, move |_| {
                let _ = registry.refresh(store.as_ref());
            }));
        }

        debug!(handlers = subs.len(), "bus commands subscribed");
        subs
    }
}

/// Index carried by a command payload: a bare number or `{"index": n}`.
fn payload_index(payload: &BusPayload) -> Option<usize> {
    let value = payload.as_json()?;
    let raw = value
        .as_u64()
        .or_else(|| value.get("index").and_then(Value::as_u64))?;
    usize::try_from(raw).ok()
}

/// Re-emit every statistics snapshot on the `statistics` channel.
async fn statistics_fanout(
    store: Arc<ResourceStore<DeviceStatistics>>,
    bus: EventBus,
    cancel: CancellationToken,
) {
    let mut stream = store.subscribe();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = stream.changed() => match changed {
                None => break,
                Some(None) => {}
                Some(Some(stats)) => match serde_json::to_value(stats.as_ref()) {
                    Ok(value) => bus.emit(channel::STATISTICS, value),
                    Err(e) => warn!(error = %e, "statistics not serializable"),
                },
            },
        }
    }
}

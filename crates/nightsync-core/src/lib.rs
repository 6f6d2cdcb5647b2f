//! Device-state synchronization between a NightDriver LED device and its
//! consumers (CLI, dashboards, scripts).
//!
//! - **[`Controller`]**: owns the process-scoped context. Selecting a device
//!   starts one fetch pipeline per device store, the effect and statistics
//!   pollers, and the bus command handlers. [`Controller::oneshot()`] runs a
//!   single operation against the configured device and shuts down.
//!
//! - **[`StoreRegistry`]**: named latest-value caches
//!   ([`ResourceStore<T>`], a `tokio::sync::watch` channel plus a refresh
//!   trigger). Device stores are filled by retrying GET pipelines; local
//!   stores persist into [`SessionStorage`].
//!
//! - **[`EventBus`]**: named channels for `Error` notices and command
//!   requests. Every failed device call surfaces here exactly once.
//!
//! - **[`Device`]**: scoped facade exposing read-only subscriptions,
//!   refresh/update, and the effect commands (`navigate`, `navigate_to`,
//!   `toggle_effect`).
//!
//! - **[`timing`]**: progress of the running effect from the remaining time
//!   the device reports, and the adaptive `/effects` refresh cadence.

pub mod bus;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod gateway;
pub mod model;
pub mod store;
pub mod stream;
pub mod timing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{BusPayload, ErrorNotice, EventBus, SubscriptionId, SubscriptionSet, channel};
pub use config::{ControllerConfig, RetryPolicy};
pub use controller::Controller;
pub use device::Device;
pub use error::CoreError;
pub use gateway::Gateway;
pub use store::{
    ConfigWriteBack, Endpoint, Origin, ResourceStore, SessionStorage, StoreHandle, StoreName,
    StoreRegistry, WriteOutcome,
};
pub use stream::ResourceStream;

pub use model::{
    Configuration, DeviceStatistics, Effect, EffectList, EffectOptions, EffectSettings, Sample,
    SettingRow, SettingSpec, SettingValue, SiteOptions, StatisticsHistory, TypedOption,
    join_settings,
};

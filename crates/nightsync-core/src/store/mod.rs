// ── Resource stores ──
//
// Named latest-value caches, the pipelines that feed them from the
// device, and the registry that owns them.

pub mod pipeline;
pub mod registry;
pub mod resource;
pub mod session;
pub mod writeback;

use strum::{AsRefStr, Display, EnumIter, EnumString};

pub use pipeline::Endpoint;
pub use registry::StoreRegistry;
pub use resource::{Origin, ResourceStore, StoreHandle};
pub use session::SessionStorage;
pub use writeback::{ConfigWriteBack, WriteOutcome};

/// The stores every controller registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, EnumString)]
pub enum StoreName {
    #[strum(serialize = "INightDriverConfiguration")]
    Configuration,
    #[strum(serialize = "INightDriverConfigurationSpecs")]
    ConfigurationSpecs,
    #[strum(serialize = "IEffects")]
    Effects,
    #[strum(serialize = "IESPState")]
    Statistics,
    #[strum(serialize = "SiteSettings")]
    SiteSettings,
    #[strum(serialize = "EffectSettings")]
    EffectSettings,
}

impl StoreName {
    /// Device endpoint feeding this store; `None` for local preferences.
    pub fn endpoint(self) -> Option<Endpoint> {
        let (path, label) = match self {
            Self::Configuration => ("/settings", "Get Chip Options"),
            Self::ConfigurationSpecs => ("/settings/specs", "Get Chip Option Specs"),
            Self::Effects => ("/effects", "Get Effects"),
            Self::Statistics => ("/statistics", "Get Chip Statistics"),
            Self::SiteSettings | Self::EffectSettings => return None,
        };
        Some(Endpoint { path, label })
    }

    /// Whether a facade may push values into this store.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Self::Configuration | Self::SiteSettings | Self::EffectSettings
        )
    }
}

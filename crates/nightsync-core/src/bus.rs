// ── Named event bus ──
//
// Fire-and-forget publish/subscribe keyed by channel name. No replay:
// a handler registered after an emit never sees it. Consumers that
// need the last value subscribe to a resource store instead.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// Channel names used between the sync core and its consumers.
pub mod channel {
    pub const ERROR: &str = "Error";
    pub const REFRESH_EFFECT_LIST: &str = "refreshEffectList";
    pub const REFRESH_STATISTICS: &str = "refreshStatistics";
    pub const SET_CHIP_CONFIG: &str = "SetChipConfig";
    pub const NAVIGATE: &str = "navigate";
    pub const NAVIGATE_TO: &str = "navigateTo";
    pub const TOGGLE_EFFECT: &str = "toggleEffect";
    pub const STATISTICS: &str = "statistics";
}

/// Payload of an `Error` emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub level: String,
    /// HTTP method for transport failures, `JSON` for payload failures.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human label of the operation that failed.
    pub target: String,
    pub notification: String,
}

impl ErrorNotice {
    pub fn error(
        kind: impl Into<String>,
        target: impl Into<String>,
        notification: impl fmt::Display,
    ) -> Self {
        Self {
            level: "error".into(),
            kind: kind.into(),
            target: target.into(),
            notification: notification.to_string(),
        }
    }
}

impl fmt::Display for ErrorNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.target, self.notification)
    }
}

/// What an emission carries.
#[derive(Debug, Clone, PartialEq)]
pub enum BusPayload {
    Empty,
    Error(ErrorNotice),
    Json(serde_json::Value),
}

impl BusPayload {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorNotice> {
        match self {
            Self::Error(notice) => Some(notice),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for BusPayload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<ErrorNotice> for BusPayload {
    fn from(notice: ErrorNotice) -> Self {
        Self::Error(notice)
    }
}

/// Token returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&BusPayload) + Send + Sync>;

/// Process-scoped named event bus. Cheap to clone.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    channels: DashMap<String, Vec<(SubscriptionId, Handler)>>,
    /// Reverse index so `unsubscribe` only needs the token.
    owners: DashMap<SubscriptionId, String>,
    next_id: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.inner.owners.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every handler registered under `name`, in subscription order.
    ///
    /// Handlers run synchronously on the caller's task and may themselves
    /// emit, subscribe, or unsubscribe.
    pub fn emit(&self, name: &str, payload: impl Into<BusPayload>) {
        let payload = payload.into();
        // Snapshot so no shard lock is held while handlers run.
        let handlers: Vec<Handler> = match self.inner.channels.get(name) {
            Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return,
        };
        trace!(channel = name, handlers = handlers.len(), "emit");
        for handler in handlers {
            handler(&payload);
        }
    }

    pub fn subscribe<F>(&self, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&BusPayload) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .channels
            .entry(name.to_owned())
            .or_default()
            .push((id, Arc::new(handler)));
        self.inner.owners.insert(id, name.to_owned());
        id
    }

    /// Remove exactly one registration. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Some((_, name)) = self.inner.owners.remove(&id) else {
            return false;
        };
        if let Some(mut list) = self.inner.channels.get_mut(&name) {
            list.retain(|(sid, _)| *sid != id);
        }
        self.inner
            .channels
            .remove_if(&name, |_, list| list.is_empty());
        true
    }

    /// Forward emissions on `name` into an unbounded channel.
    pub fn listen(&self, name: &str) -> (SubscriptionId, mpsc::UnboundedReceiver<BusPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(name, move |payload| {
            let _ = tx.send(payload.clone());
        });
        (id, rx)
    }

    /// Number of handlers currently registered under `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.inner.channels.get(name).map_or(0, |list| list.len())
    }

    /// Emit an `Error` notice.
    pub fn report(&self, notice: ErrorNotice) {
        self.emit(channel::ERROR, notice);
    }
}

/// Group of registrations removed together when dropped.
#[derive(Debug)]
pub struct SubscriptionSet {
    bus: EventBus,
    ids: Vec<SubscriptionId>,
}

impl SubscriptionSet {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            ids: Vec::new(),
        }
    }

    pub fn push(&mut self, id: SubscriptionId) {
        self.ids.push(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

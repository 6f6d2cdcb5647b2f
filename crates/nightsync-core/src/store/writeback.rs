// ── Configuration write-back ──
//
// Local edits to the device configuration are POSTed to `/settings` as
// multipart fields and the device's answer replaces the cache. An edit
// whose serialized form matches the cache, the write in flight, or the
// last acknowledged write is dropped without a request, so a device
// echoing the document back cannot start a POST loop.

use std::sync::{Arc, Mutex, PoisonError};

use nightsync_api::{Method, RequestBody};
use tracing::{debug, warn};

use super::pipeline::JSON_ERROR;
use super::resource::ResourceStore;
use crate::bus::ErrorNotice;
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::model::Configuration;

pub const SETTINGS_PATH: &str = "/settings";
pub const WRITE_LABEL: &str = "Set Chip Config";

/// Result of a write-back attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Identical to the cached or last written value; no request was made.
    Skipped,
    /// The device accepted the write; the cache holds its answer.
    Acknowledged(Arc<Configuration>),
}

#[derive(Debug, Default)]
pub struct ConfigWriteBack {
    state: Mutex<WriteState>,
}

#[derive(Debug, Default)]
struct WriteState {
    /// Serialized value of the request in flight.
    last_sent: Option<String>,
    /// Serialized value the device last confirmed.
    last_acknowledged: Option<String>,
}

impl ConfigWriteBack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget write history, e.g. after switching devices.
    pub fn reset(&self) {
        *self.lock() = WriteState::default();
    }

    /// Serialized form of the last acknowledged write.
    pub fn last_acknowledged(&self) -> Option<String> {
        self.lock().last_acknowledged.clone()
    }

    /// Push a locally edited configuration to the device.
    ///
    /// The edit is visible in the cache immediately. On failure the cache
    /// reverts to its previous value unless a fetch replaced the edit in the
    /// meantime. The write is not retried.
    pub async fn write(
        &self,
        gateway: &Gateway,
        store: &ResourceStore<Configuration>,
        value: Configuration,
    ) -> Result<WriteOutcome, CoreError> {
        let serialized = serde_json::to_string(&value)?;
        let previous = store.current();
        let cached = previous
            .as_ref()
            .map(|current| serde_json::to_string(current.as_ref()))
            .transpose()?;
        {
            let mut state = self.lock();
            let seen = |prev: &Option<String>| prev.as_deref() == Some(serialized.as_str());
            if seen(&cached) || seen(&state.last_sent) || seen(&state.last_acknowledged) {
                debug!("configuration unchanged, skipping write");
                return Ok(WriteOutcome::Skipped);
            }
            state.last_sent = Some(serialized.clone());
        }

        let fields = value.form_fields();
        let optimistic = Arc::new(value.clone());
        store.restore(Some(Arc::clone(&optimistic)));

        let result = self.post(gateway, fields).await;
        match result {
            Ok(answer) => {
                let refetch = answer.is_none();
                let ack = answer.unwrap_or(value);
                let ack_serialized = serde_json::to_string(&ack)?;
                {
                    let mut state = self.lock();
                    state.last_sent = None;
                    state.last_acknowledged = Some(ack_serialized);
                }
                let ack = store.publish(ack);
                if refetch {
                    store.refresh();
                }
                Ok(WriteOutcome::Acknowledged(ack))
            }
            Err(e) => {
                self.lock().last_sent = None;
                if store.restore_if_current(&optimistic, previous) {
                    warn!(error = %e, "configuration write failed, restoring cache");
                } else {
                    warn!(error = %e, "configuration write failed, keeping newer fetched value");
                }
                Err(e)
            }
        }
    }

    /// POST the fields. `Ok(None)` means the device accepted the write but
    /// its answer could not be read as a configuration document.
    async fn post(
        &self,
        gateway: &Gateway,
        fields: Vec<(String, String)>,
    ) -> Result<Option<Configuration>, CoreError> {
        let resp = gateway
            .request(
                Method::POST,
                SETTINGS_PATH,
                RequestBody::Multipart(fields),
                WRITE_LABEL,
            )
            .await
            .ok_or_else(|| CoreError::RequestFailed {
                operation: WRITE_LABEL.into(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            gateway.report(ErrorNotice::error(
                Method::POST.as_str(),
                WRITE_LABEL,
                format!("HTTP {status}"),
            ));
            return Err(CoreError::Rejected {
                operation: WRITE_LABEL.into(),
                status: status.as_u16(),
            });
        }

        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => {
                gateway.report(ErrorNotice::error(Method::POST.as_str(), WRITE_LABEL, e));
                return Ok(None);
            }
        };
        match nightsync_api::parse::<Configuration>(&text) {
            Ok(answer) => Ok(Some(answer)),
            Err(e) => {
                gateway.report(ErrorNotice::error(JSON_ERROR, WRITE_LABEL, e));
                Ok(None)
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WriteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nightsync_api::{DeviceAddress, DeviceClient, TransportConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::bus::{EventBus, channel};

    /// Accept one request, answer 200 and hang up partway through the body.
    async fn truncating_device() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0_u8; 4096];
            while !request.ends_with(b"--\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 64\r\n\r\n{\"bright")
                .await
                .unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn unreadable_answer_reports_post_and_keeps_value() {
        let bus = EventBus::new();
        let (_id, mut errors) = bus.listen(channel::ERROR);
        let address = DeviceAddress::parse(&truncating_device().await).unwrap();
        let client = DeviceClient::new(address, &TransportConfig::default()).unwrap();
        let gateway = Gateway::new(client, bus);

        let store = ResourceStore::<Configuration>::device("config");
        let writeback = ConfigWriteBack::new();
        let mut edit = Configuration::new();
        edit.insert("brightness", 42_i64);

        let outcome = writeback.write(&gateway, &store, edit.clone()).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Acknowledged(Arc::new(edit.clone())));
        assert_eq!(store.current().as_deref(), Some(&edit));

        let payload = errors.recv().await.unwrap();
        let notice = payload.as_error().unwrap();
        assert_eq!(notice.kind, "POST");
        assert_eq!(notice.target, WRITE_LABEL);
    }

    #[tokio::test]
    async fn unchanged_edit_is_skipped_offline() {
        let bus = EventBus::new();
        let address = DeviceAddress::parse("http://127.0.0.1:9").unwrap();
        let client = DeviceClient::new(address, &TransportConfig::default()).unwrap();
        let gateway = Gateway::new(client, bus);

        let mut current = Configuration::new();
        current.insert("brightness", 10_i64);
        let store = ResourceStore::<Configuration>::device("config");
        store.publish(current.clone());

        let outcome = ConfigWriteBack::new()
            .write(&gateway, &store, current)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped);
    }
}

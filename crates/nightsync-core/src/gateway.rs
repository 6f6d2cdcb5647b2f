// ── HTTP request gateway ──
//
// Single device call with the transport timeout. Transport failures are
// reported on the `Error` channel and collapse to `None`; callers treat
// `None` as failure, never as an empty value.

use nightsync_api::{DeviceClient, Method, RequestBody, Response};
use tracing::{debug, warn};

use crate::bus::{ErrorNotice, EventBus};

/// A device client paired with the bus its failures are reported on.
#[derive(Debug, Clone)]
pub struct Gateway {
    client: DeviceClient,
    bus: EventBus,
}

impl Gateway {
    pub fn new(client: DeviceClient, bus: EventBus) -> Self {
        Self { client, bus }
    }

    pub fn client(&self) -> &DeviceClient {
        &self.client
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Issue one request labelled `label`.
    ///
    /// Any HTTP status is returned as `Some`. A transport failure or timeout
    /// emits `Error {type: <method>, target: <label>}` and yields `None`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        label: &str,
    ) -> Option<Response> {
        match self.client.send(method.clone(), path, body).await {
            Ok(resp) => {
                debug!(label, path, status = resp.status().as_u16(), "device answered");
                Some(resp)
            }
            Err(e) => {
                self.report(ErrorNotice::error(method.as_str(), label, &e));
                None
            }
        }
    }

    /// Log and emit an `Error` notice.
    pub fn report(&self, notice: ErrorNotice) {
        warn!(kind = %notice.kind, operation = %notice.target, error = %notice.notification, "device error");
        self.bus.report(notice);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nightsync_api::{DeviceAddress, TransportConfig};

    use super::*;
    use crate::bus::channel;

    #[tokio::test]
    async fn unreachable_device_reports_method_and_label() {
        let bus = EventBus::new();
        let (_id, mut errors) = bus.listen(channel::ERROR);

        let address = DeviceAddress::parse("http://127.0.0.1:9").unwrap();
        let client = DeviceClient::new(address, &TransportConfig::default()).unwrap();
        let gateway = Gateway::new(client, bus);

        let resp = gateway
            .request(Method::POST, "/nextEffect", RequestBody::Empty, "navigate")
            .await;
        assert!(resp.is_none());

        let payload = errors.recv().await.unwrap();
        let notice = payload.as_error().unwrap();
        assert_eq!(notice.kind, "POST");
        assert_eq!(notice.target, "navigate");
    }
}

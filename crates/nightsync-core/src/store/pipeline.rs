// ── Fetch pipeline ──
//
// Turns refresh triggers into published values. Each trigger occurrence
// is retried at a fixed delay until it produces a value, the retry policy
// gives up, or the device is deselected. Failed attempts never reach
// subscribers; they are only visible on the `Error` channel.

use std::sync::Arc;

use nightsync_api::{Method, RequestBody};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::resource::ResourceStore;
use crate::bus::ErrorNotice;
use crate::config::RetryPolicy;
use crate::gateway::Gateway;

/// Tag on `Error` notices for payloads that failed the parse guard.
pub const JSON_ERROR: &str = "JSON";

/// A device resource: where to fetch it and how to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub path: &'static str,
    pub label: &'static str,
}

/// One GET. Every failure is reported on the bus and collapses to `None`.
pub async fn fetch_once<T: DeserializeOwned>(gateway: &Gateway, endpoint: Endpoint) -> Option<T> {
    let resp = gateway
        .request(Method::GET, endpoint.path, RequestBody::Empty, endpoint.label)
        .await?;

    let status = resp.status();
    if !status.is_success() {
        gateway.report(ErrorNotice::error(
            Method::GET.as_str(),
            endpoint.label,
            format!("HTTP {status}"),
        ));
        return None;
    }

    let text = match resp.text().await {
        Ok(text) => text,
        Err(e) => {
            gateway.report(ErrorNotice::error(Method::GET.as_str(), endpoint.label, e));
            return None;
        }
    };

    match nightsync_api::parse::<T>(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            gateway.report(ErrorNotice::error(JSON_ERROR, endpoint.label, e));
            None
        }
    }
}

/// Fetch `endpoint` until it yields a value.
///
/// Returns `None` if cancelled or if `retry` runs out of attempts.
pub async fn fetch_with_retry<T: DeserializeOwned>(
    gateway: &Gateway,
    endpoint: Endpoint,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
) -> Option<T> {
    let mut attempts: u32 = 0;
    loop {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            outcome = fetch_once::<T>(gateway, endpoint) => outcome,
        };
        if outcome.is_some() {
            return outcome;
        }

        attempts = attempts.saturating_add(1);
        if !retry.allows(attempts) {
            warn!(label = endpoint.label, attempts, "giving up");
            return None;
        }
        debug!(label = endpoint.label, attempts, delay = ?retry.delay, "retrying");

        tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            () = tokio::time::sleep(retry.delay) => {}
        }
    }
}

/// Serve refresh triggers for `store` until `cancel` fires.
pub async fn run_pipeline<T>(
    gateway: Arc<Gateway>,
    store: Arc<ResourceStore<T>>,
    endpoint: Endpoint,
    retry: RetryPolicy,
    cancel: CancellationToken,
) where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    debug!(store = store.name(), path = endpoint.path, "pipeline started");
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = store.triggered() => {}
        }

        let Some(value) = fetch_with_retry::<T>(&gateway, endpoint, &retry, &cancel).await else {
            if cancel.is_cancelled() {
                break;
            }
            continue;
        };
        if cancel.is_cancelled() {
            break;
        }
        store.publish(value);
    }
    debug!(store = store.name(), "pipeline stopped");
}

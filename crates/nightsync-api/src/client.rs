// Device HTTP client
//
// Wraps `reqwest::Client` with device-relative URL construction and the
// two body encodings the firmware accepts. Status codes are not judged
// here: callers receive the raw response and decide what counts as success.

use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::address::DeviceAddress;
use crate::error::Error;
use crate::json;
use crate::transport::TransportConfig;

/// Request payload encodings understood by the firmware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
    /// `multipart/form-data` text fields.
    Multipart(Vec<(String, String)>),
}

impl RequestBody {
    /// Single-field urlencoded body, e.g. `effectIndex=3`.
    pub fn field(name: impl Into<String>, value: impl ToString) -> Self {
        Self::Form(vec![(name.into(), value.to_string())])
    }
}

/// HTTP client bound to one device address.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    address: DeviceAddress,
    origin: String,
    timeout_ms: u64,
}

impl DeviceClient {
    /// Create a client for `address` with a fresh `reqwest::Client`.
    pub fn new(address: DeviceAddress, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, address, transport))
    }

    /// Create a client sharing an existing `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        address: DeviceAddress,
        transport: &TransportConfig,
    ) -> Self {
        Self {
            http,
            address,
            origin: transport.origin.clone(),
            timeout_ms: transport.timeout_ms(),
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Absolute URL for a device path such as `/effects`.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        self.address.resolve(&self.origin, path)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Issue one request. Only transport failures and timeouts are errors;
    /// any HTTP status is returned to the caller.
    pub async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: RequestBody,
    ) -> Result<reqwest::Response, Error> {
        let url = self.url(path)?;
        debug!("{} {}", method, url);

        let builder = self.http.request(method, url);
        let builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(fields) => {
                let form = fields
                    .into_iter()
                    .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                        form.text(name, value)
                    });
                builder.multipart(form)
            }
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_ms))?;
        trace!(status = resp.status().as_u16(), "response");
        Ok(resp)
    }

    /// GET `path` and return the body text, treating non-2xx as an error.
    pub async fn get_text(&self, path: &str) -> Result<String, Error> {
        let resp = self
            .send(reqwest::Method::GET, path, RequestBody::Empty)
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                label: format!("GET {path}"),
            });
        }
        resp.text()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_ms))
    }

    /// GET `path` and run the body through the JSON parse guard.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let text = self.get_text(path).await?;
        Ok(json::parse(&text)?)
    }

    /// POST `body` to `path`, treating non-2xx as an error.
    pub async fn post(&self, path: &str, body: RequestBody) -> Result<(), Error> {
        let resp = self.send(reqwest::Method::POST, path, body).await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Status {
                status: status.as_u16(),
                label: format!("POST {path}"),
            })
        }
    }
}

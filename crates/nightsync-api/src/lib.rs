// nightsync-api: Async HTTP transport for NightDriver LED strip controllers

pub mod address;
pub mod client;
pub mod error;
pub mod json;
pub mod transport;

pub use address::DeviceAddress;
pub use client::{DeviceClient, RequestBody};
pub use error::Error;
pub use json::{ParseError, parse, parse_with};
pub use reqwest::{Method, Response, StatusCode};
pub use transport::TransportConfig;

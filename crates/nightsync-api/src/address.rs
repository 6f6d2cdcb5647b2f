use std::fmt;

use url::{Host, Url};

use crate::error::Error;

/// Label the web panel uses for the device that served it.
pub const CURRENT_DEVICE: &str = "Current Device";

/// Which controller a request is addressed to.
///
/// The locally hosted device answers on the panel's own origin, so its
/// paths carry no prefix. Remote devices prefix every path with their
/// base URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceAddress {
    /// The device hosting the panel; resolved against the transport origin.
    #[default]
    Current,
    /// A controller reachable at an explicit base URL.
    Remote(Url),
}

impl DeviceAddress {
    /// Parse a user-supplied address.
    ///
    /// `current`, `Current Device` and the empty string select the locally
    /// hosted device; anything else must be an absolute URL.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let trimmed = input.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("current")
            || trimmed == CURRENT_DEVICE
        {
            return Ok(Self::Current);
        }
        Ok(Self::Remote(Url::parse(trimmed)?))
    }

    /// Build the final URL for `path` (which must start with `/`).
    pub fn resolve(&self, origin: &str, path: &str) -> Result<Url, Error> {
        let base = match self {
            Self::Current => origin,
            Self::Remote(url) => url.as_str(),
        };
        let base = base.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    /// Short display name: `Esp32` for the local device, otherwise the
    /// dotted IPv4 host (empty when the host is not an IPv4 literal).
    pub fn short_name(&self) -> String {
        match self {
            Self::Current => "Esp32".into(),
            Self::Remote(url) => match url.host() {
                Some(Host::Ipv4(ip)) => ip.to_string(),
                _ => String::new(),
            },
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str(CURRENT_DEVICE),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ORIGIN: &str = "http://localhost/";

    #[test]
    fn current_aliases() {
        assert_eq!(DeviceAddress::parse("").unwrap(), DeviceAddress::Current);
        assert_eq!(DeviceAddress::parse("current").unwrap(), DeviceAddress::Current);
        assert_eq!(
            DeviceAddress::parse("Current Device").unwrap(),
            DeviceAddress::Current
        );
    }

    #[test]
    fn remote_prefixes_path() {
        let addr = DeviceAddress::parse("http://192.168.1.40/").unwrap();
        let url = addr.resolve(ORIGIN, "/settings/specs").unwrap();
        assert_eq!(url.as_str(), "http://192.168.1.40/settings/specs");
    }

    #[test]
    fn current_uses_origin() {
        let url = DeviceAddress::Current.resolve(ORIGIN, "/effects").unwrap();
        assert_eq!(url.as_str(), "http://localhost/effects");
    }

    #[test]
    fn short_names() {
        assert_eq!(DeviceAddress::Current.short_name(), "Esp32");
        let ip = DeviceAddress::parse("http://10.0.0.7:8080").unwrap();
        assert_eq!(ip.short_name(), "10.0.0.7");
        let named = DeviceAddress::parse("http://strip.local").unwrap();
        assert_eq!(named.short_name(), "");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            DeviceAddress::parse("not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }
}

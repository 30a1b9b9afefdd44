use std::fmt;

use percent_encoding::percent_decode_str;
use qstring::QString;
use url::Url;

use dubbo_protocol::{Error, ErrorKind, Result};

/// The network location of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new<H: Into<String>>(host: H, port: u16) -> Endpoint {
        Endpoint {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A provider as advertised under `/<root>/<service>/providers`.
#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    pub endpoint: Endpoint,
    /// the environment tag the provider was published with
    pub version: Option<String>,
    pub methods: Vec<String>,
}

impl Provider {
    pub fn new(endpoint: Endpoint, methods: Vec<String>) -> Provider {
        Provider {
            endpoint,
            version: None,
            methods,
        }
    }

    /// Parses a registry child name such as
    /// `dubbo%3A%2F%2F10.0.0.5%3A20880%2Fcom.example.Foo%3Fversion%3DDEV%26methods%3Dbar%2Cbaz`.
    pub fn parse(child: &str) -> Result<Provider> {
        let decoded = percent_decode_str(child).decode_utf8_lossy();
        let url = Url::parse(&decoded).map_err(|err| {
            Error::new(
                ErrorKind::InvalidArgument,
                format!("bad provider url {:?}: {}", decoded, err),
            )
        })?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidArgument,
                    format!("provider url {:?} has no host", decoded),
                )
            })?;
        let port = url.port().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidArgument,
                format!("provider url {:?} has no port", decoded),
            )
        })?;

        let qs = QString::from(url.query().unwrap_or(""));
        let methods = qs
            .get("methods")
            .map(|m| {
                m.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Provider {
            endpoint: Endpoint::new(host, port),
            version: qs.get("version").map(String::from),
            methods,
        })
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }
}

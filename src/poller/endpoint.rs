use std::fmt;

use url::Url;

use crate::error::ConfigError;

/// Transport scheme of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// One fully resolved REST endpoint: scheme, host, port and request
/// target, extracted once at startup so the polling loop never
/// re-parses URLs.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: Option<String>,
}

impl Endpoint {
    /// Parses an http/https URL. Anything else is a configuration
    /// error; URLs come from adapters and operators, never from
    /// network input.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw).map_err(|err| ConfigError::Endpoint {
            url: raw.to_string(),
            reason: err.to_string(),
        })?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(ConfigError::Endpoint {
                    url: raw.to_string(),
                    reason: format!("unsupported scheme '{other}'"),
                });
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::Endpoint {
                url: raw.to_string(),
                reason: "URL has no host".to_string(),
            })?
            .to_string();
        let port = url.port_or_known_default().ok_or_else(|| ConfigError::Endpoint {
            url: raw.to_string(),
            reason: "URL has no port".to_string(),
        })?;
        let path = if url.path().is_empty() {
            "/".to_string()
        } else {
            url.path().to_string()
        };

        Ok(Self {
            scheme,
            host,
            port,
            path,
            query: url.query().map(str::to_string),
        })
    }

    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::Https
    }

    /// Origin-form request target: path plus query string.
    pub fn request_target(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            self.request_target()
        )
    }
}

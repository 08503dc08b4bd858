//! Ordered pool of interchangeable provider endpoints.

use std::fmt::{Display, Formatter};

use reqwest::Url;
use serde::{Serialize, Serializer};

use crate::ValidationError;

/// Validated `http`/`https` JSON-RPC endpoint.
///
/// Provider URLs commonly embed an API key in the path or query, so the
/// `Display` form only shows scheme and host. Use [`Endpoint::as_str`] for
/// the full URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    url: String,
    label: String,
}

impl Endpoint {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let invalid = || ValidationError::InvalidEndpoint {
            value: redact(trimmed),
        };

        let url = Url::parse(trimmed).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid());
        }
        let host = url.host_str().ok_or_else(invalid)?;
        let label = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };

        Ok(Self {
            url: trimmed.to_owned(),
            label,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

impl Serialize for Endpoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.label)
    }
}

fn redact(input: &str) -> String {
    match input.find("://") {
        Some(index) => {
            let rest = &input[index + 3..];
            let host_end = rest.find(['/', '?']).unwrap_or(rest.len());
            format!("{}{}", &input[..index + 3], &rest[..host_end])
        }
        None => String::from("<unparseable>"),
    }
}

/// Endpoint pool with a current selection.
///
/// The index always points at a valid entry; rotation is a cyclic
/// permutation over the pool.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<Endpoint>,
    index: usize,
}

impl EndpointPool {
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self, ValidationError> {
        if endpoints.is_empty() {
            return Err(ValidationError::EmptyEndpointPool);
        }
        Ok(Self {
            endpoints,
            index: 0,
        })
    }

    pub fn parse<I, S>(urls: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints = urls
            .into_iter()
            .map(|url| Endpoint::parse(url.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(endpoints)
    }

    pub fn current(&self) -> &Endpoint {
        &self.endpoints[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Advances to the next endpoint, wrapping around, and returns it.
    pub fn rotate(&mut self) -> &Endpoint {
        self.index = (self.index + 1) % self.endpoints.len();
        self.current()
    }
}

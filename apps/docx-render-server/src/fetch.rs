//! Template retrieval
//!
//! The render handler only sees [`TemplateFetcher`]; the production
//! implementation is [`HttpFetcher`], a thin wrapper over a `reqwest`
//! client guarded by a [`LocationPolicy`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Url};
use thiserror::Error;
use tracing::{debug, warn};

/// Redirect hops followed before giving up
const MAX_REDIRECTS: usize = 10;

/// Largest template body read from upstream unless configured otherwise
pub const DEFAULT_MAX_TEMPLATE_BYTES: usize = 25 * 1024 * 1024;

/// Why a template could not be fetched
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("upstream responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("request failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("location not allowed: {reason}")]
    NotAllowed { url: String, reason: String },

    #[error("template exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

impl FetchError {
    /// Upstream HTTP status, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn into_url(self) -> String {
        match self {
            FetchError::Status { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::NotAllowed { url, .. }
            | FetchError::TooLarge { url, .. } => url,
        }
    }
}

/// Retrieves raw template bytes from a location
#[async_trait]
pub trait TemplateFetcher: Send + Sync {
    async fn fetch(&self, location: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Which locations may be fetched
///
/// Only `http` and `https` are ever accepted. An empty host list allows
/// every host; otherwise the host must match an entry exactly, or end
/// with the suffix of a `*.example.com` entry.
#[derive(Debug, Clone, Default)]
pub struct LocationPolicy {
    allowed_hosts: Vec<String>,
}

impl LocationPolicy {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_hosts = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { allowed_hosts }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allowed_hosts.is_empty()
    }

    pub fn check(&self, location: &Url) -> Result<(), FetchError> {
        let not_allowed = |reason: String| FetchError::NotAllowed {
            url: location.to_string(),
            reason,
        };

        match location.scheme() {
            "http" | "https" => {}
            other => return Err(not_allowed(format!("scheme '{}' is not supported", other))),
        }

        if self.is_unrestricted() {
            return Ok(());
        }

        let host = location.host_str().unwrap_or_default().to_ascii_lowercase();
        let listed = self.allowed_hosts.iter().any(|allowed| {
            match allowed.strip_prefix("*.") {
                Some(domain) => host
                    .strip_suffix(domain)
                    .is_some_and(|sub| sub.ends_with('.') && sub.len() > 1),
                None => *allowed == host,
            }
        });

        if listed {
            Ok(())
        } else {
            Err(not_allowed(format!("host '{}' is not in the allow-list", host)))
        }
    }
}

/// Fetches templates over HTTP(S)
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: LocationPolicy,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, policy: LocationPolicy) -> Result<Self, reqwest::Error> {
        let redirect_policy = policy.clone();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docx-render-server/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if let Err(err) = redirect_policy.check(attempt.url()) {
                    attempt.error(err.to_string())
                } else {
                    attempt.follow()
                }
            }))
            .build()?;

        Ok(Self {
            client,
            policy,
            max_bytes: DEFAULT_MAX_TEMPLATE_BYTES,
        })
    }

    /// Refuse template bodies larger than `max_bytes`
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl TemplateFetcher for HttpFetcher {
    async fn fetch(&self, location: &Url) -> Result<Vec<u8>, FetchError> {
        self.policy.check(location)?;

        let transport = |err: reqwest::Error| FetchError::Transport {
            url: location.to_string(),
            reason: err.to_string(),
        };

        let too_large = || FetchError::TooLarge {
            url: location.to_string(),
            limit: self.max_bytes,
        };

        let mut response = self
            .client
            .get(location.clone())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            warn!("Template fetch from {} returned {}", location, status);
            return Err(FetchError::Status {
                url: location.to_string(),
                status: status.as_u16(),
            });
        }

        if response
            .content_length()
            .is_some_and(|length| length > self.max_bytes as u64)
        {
            warn!("Template at {} is larger than {} bytes", location, self.max_bytes);
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            if body.len() + chunk.len() > self.max_bytes {
                warn!("Template at {} is larger than {} bytes", location, self.max_bytes);
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes from {}", body.len(), location);
        Ok(body)
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use thiserror::Error;
use url::Url;

use crate::browser::pick_user_agent;

#[derive(Debug, Error)]
#[error("failed to initialize reachability probe: {0}")]
pub struct ProbeError(#[from] reqwest::Error);

/// Verdict of the pre-visit reachability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    Reachable,
    /// Structurally broken URL; no request was made.
    Invalid(String),
    /// Well-formed but the probe request failed or returned an error status.
    Unreachable(String),
}

impl ProbeVerdict {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeVerdict::Reachable)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ProbeVerdict::Reachable => None,
            ProbeVerdict::Invalid(reason) | ProbeVerdict::Unreachable(reason) => Some(reason),
        }
    }
}

/// Seam for the lightweight pre-visit probe; tests substitute scripted
/// verdicts.
#[async_trait]
pub trait ReachabilityProbe: Send {
    async fn check(&self, url: &str) -> ProbeVerdict;
}

/// HEAD-request prober with a bounded timeout, following redirects.
pub struct HttpProbe {
    client: reqwest::Client,
    user_agents: Vec<String>,
}

impl HttpProbe {
    pub fn new(timeout: Duration, user_agents: Vec<String>) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            client,
            user_agents,
        })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn check(&self, url: &str) -> ProbeVerdict {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => return ProbeVerdict::Invalid(format!("malformed url: {err}")),
        };
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return ProbeVerdict::Invalid("missing scheme or host".to_string());
        }

        let user_agent = pick_user_agent(&self.user_agents);
        match self
            .client
            .head(parsed)
            .header(USER_AGENT, user_agent)
            .send()
            .await
        {
            Ok(response) if response.status().as_u16() < 400 => ProbeVerdict::Reachable,
            Ok(response) => ProbeVerdict::Unreachable(format!("HTTP {}", response.status())),
            Err(err) => ProbeVerdict::Unreachable(format!("connection error: {err}")),
        }
    }
}

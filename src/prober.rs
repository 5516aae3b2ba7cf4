use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dyn_clone::DynClone;
use tracing::{debug, trace};

pub const DEFAULT_PROBE_RETRIES: u32 = 2;
pub const DEFAULT_PROBE_DELAY_MILLISECONDS: u64 = 1500;
pub const DEFAULT_PROBE_TIMEOUT_MILLISECONDS: u64 = 10_000;

const ACCESSIBLE_STATUS: u16 = 200;

/// HTTP GET capability used to check public reachability.
#[async_trait]
pub trait HttpFetcher: DynClone {
    /// Issue a GET and return the response status code.
    async fn get_status(&self, url: &str) -> Result<u16>;
}

dyn_clone::clone_trait_object!(HttpFetcher);

pub type Fetcher = Box<dyn HttpFetcher + Send + Sync>;

/// [`HttpFetcher`] backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("reqwest::Client::builder() failed.")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get_status(&self, url: &str) -> Result<u16> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("HTTP GET {url} failed."))?;

        Ok(response.status().as_u16())
    }
}

/// Checks that a URL answers with status 200, retrying a bounded number of times.
#[derive(Clone)]
pub struct AccessibilityProber {
    fetcher: Fetcher,
    retries: u32,
    delay: Duration,
}

impl AccessibilityProber {
    pub fn new(fetcher: Fetcher, retries: u32, delay: Duration) -> Self {
        Self {
            fetcher,
            retries,
            delay,
        }
    }

    pub fn with_defaults(fetcher: Fetcher) -> Self {
        Self::new(
            fetcher,
            DEFAULT_PROBE_RETRIES,
            Duration::from_millis(DEFAULT_PROBE_DELAY_MILLISECONDS),
        )
    }

    /// Returns true as soon as one attempt sees status 200.
    ///
    /// Transport errors and other statuses are retried after `delay`, up to
    /// `retries` attempts in total (at least one). There is no delay after the
    /// last attempt. The delay only suspends the calling task.
    pub async fn probe(&self, url: &str) -> bool {
        let attempts = self.retries.max(1);

        for attempt in 1..=attempts {
            match self.fetcher.get_status(url).await {
                Ok(ACCESSIBLE_STATUS) => {
                    trace!(url = url, attempt = attempt, "URL is accessible.");
                    return true;
                }
                Ok(status) => {
                    debug!(url = url, attempt = attempt, status = status, "unexpected HTTP status.");
                }
                Err(e) => {
                    debug!(url = url, attempt = attempt, "HTTP probe failed: {e:#}");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.delay).await;
            }
        }

        false
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}

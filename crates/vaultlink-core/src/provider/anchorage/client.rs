use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{header, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::connection::ValidConnection;
use crate::error::ProviderError;

use super::types::{
    AnchorageAssetType, AnchorageTrustedDestination, AnchorageVault, AnchorageWallet, Page, Single,
};
use super::AnchorageClient;

const API_KEY_HEADER: &str = "Api-Access-Key";

/// Upper bound on cursor pages followed for one listing.
const MAX_PAGES: usize = 1_000;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Anchorage REST client over HTTPS.
///
/// One instance serves every connection: the base URL and API key come from
/// the [`ValidConnection`] passed to each call. If `requests_per_second` is
/// set, every outbound request (including each page of a listing) waits on
/// a shared rate limiter.
pub struct HttpAnchorageClient {
    client: reqwest::Client,
    limiter: Option<DirectRateLimiter>,
}

impl HttpAnchorageClient {
    pub fn new(
        requests_per_second: Option<u32>,
        request_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout.min(CONNECT_TIMEOUT))
            .timeout(request_timeout)
            .pool_max_idle_per_host(16)
            .build()
            .map_err(|e| ProviderError::Transport(format!("build http client: {e}")))?;

        let limiter = requests_per_second
            .and_then(NonZeroU32::new)
            .map(|limit| RateLimiter::direct(Quota::per_second(limit)));

        Ok(Self { client, limiter })
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        connection: &ValidConnection,
        url: Url,
    ) -> Result<T, ProviderError> {
        self.wait_for_rate_limit().await;
        let path = url.path().to_owned();
        debug!(connection.id = %connection.id, %url, "anchorage request");

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &connection.credentials.api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        trace!(connection.id = %connection.id, %status, body = %body, "anchorage response body");

        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(path));
        }
        if !status.is_success() {
            warn!(connection.id = %connection.id, %status, path, "anchorage request failed");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(format!("{path}: {e}")))
    }

    /// Follow `page.next` cursors until the listing is exhausted.
    async fn get_paged<T: DeserializeOwned>(
        &self,
        connection: &ValidConnection,
        segments: &[&str],
    ) -> Result<Vec<T>, ProviderError> {
        let first = api_url(&connection.url, segments)?;
        let mut items = Vec::new();
        let mut next = Some(first.clone());
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(ProviderError::Decode(format!(
                    "{}: pagination exceeded {MAX_PAGES} pages",
                    first.path()
                )));
            }
            let page: Page<T> = self.get_json(connection, url).await?;
            items.extend(page.data);
            next = match page.page.and_then(|p| p.next).filter(|n| !n.is_empty()) {
                Some(cursor) => Some(cursor_url(&connection.url, &cursor)?),
                None => None,
            };
        }

        debug!(connection.id = %connection.id, path = first.path(), pages, items = items.len(), "anchorage listing fetched");
        Ok(items)
    }
}

/// Append path segments to the connection's base URL. Any base path prefix
/// is kept and each segment is percent-encoded.
fn api_url(base: &Url, segments: &[&str]) -> Result<Url, ProviderError> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|()| ProviderError::Transport(format!("{base} cannot be a base url")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Resolve a `page.next` cursor. Absolute URLs are followed as given; a path
/// such as `/v2/wallets?afterId=..` is taken relative to the base URL.
fn cursor_url(base: &Url, cursor: &str) -> Result<Url, ProviderError> {
    if let Ok(absolute) = Url::parse(cursor) {
        return Ok(absolute);
    }
    let mut root = base.clone();
    root.set_query(None);
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    root.join(cursor.trim_start_matches('/'))
        .map_err(|e| ProviderError::Transport(format!("bad page cursor {cursor}: {e}")))
}

#[async_trait]
impl AnchorageClient for HttpAnchorageClient {
    async fn get_vaults(
        &self,
        connection: &ValidConnection,
    ) -> Result<Vec<AnchorageVault>, ProviderError> {
        self.get_paged(connection, &["v2", "vaults"]).await
    }

    async fn get_wallets(
        &self,
        connection: &ValidConnection,
    ) -> Result<Vec<AnchorageWallet>, ProviderError> {
        self.get_paged(connection, &["v2", "wallets"]).await
    }

    async fn get_wallet(
        &self,
        connection: &ValidConnection,
        wallet_id: &str,
    ) -> Result<AnchorageWallet, ProviderError> {
        let url = api_url(&connection.url, &["v2", "wallets", wallet_id])?;
        let single: Single<AnchorageWallet> = self.get_json(connection, url).await?;
        Ok(single.data)
    }

    async fn get_trusted_destinations(
        &self,
        connection: &ValidConnection,
    ) -> Result<Vec<AnchorageTrustedDestination>, ProviderError> {
        self.get_paged(connection, &["v2", "trusted_destinations"]).await
    }

    async fn get_asset_types(
        &self,
        connection: &ValidConnection,
    ) -> Result<Vec<AnchorageAssetType>, ProviderError> {
        self.get_paged(connection, &["v2", "asset-types"]).await
    }
}

//! Retrieval of the raw CDX listing for a domain.

use tracing::{info, instrument};

use super::error::ListingError;
use crate::config::ArchiveEndpoints;
use crate::download::{HttpClient, RetryPolicy, fetch_with_retry};

/// Fetches the complete snapshot listing for a domain in one request.
///
/// Retry and throttling come from the shared fetch primitive, so the
/// listing request obeys the same delay and retry budget as captures.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotIndexFetcher<'a> {
    client: &'a HttpClient,
    endpoints: &'a ArchiveEndpoints,
    retry_policy: RetryPolicy,
}

impl<'a> SnapshotIndexFetcher<'a> {
    /// Creates a fetcher using `client` against `endpoints`.
    #[must_use]
    pub fn new(
        client: &'a HttpClient,
        endpoints: &'a ArchiveEndpoints,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            endpoints,
            retry_policy,
        }
    }

    /// Returns the raw listing body.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the parser drops any
    /// row it damages.
    ///
    /// # Errors
    ///
    /// - [`ListingError::Endpoint`] if the listing URL cannot be built
    /// - [`ListingError::Network`] once every attempt has failed
    #[instrument(skip(self))]
    pub async fn fetch(&self, domain: &str) -> Result<String, ListingError> {
        let url = self.endpoints.listing_url(domain)?;
        info!(url = %url, "fetching snapshot listing");

        let body = fetch_with_retry(self.client, url.as_str(), &self.retry_policy)
            .await
            .map_err(ListingError::Network)?;

        info!(bytes = body.len(), "snapshot listing received");
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

use crate::types::{FeedDescriptor, RawDocument, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Retrieves the raw document behind one feed descriptor.
///
/// The HTTP implementation lives in [`crate::fetcher::HttpFetcher`]; tests
/// plug in canned documents through the same seam.
#[async_trait]
pub trait FetchFeed: Send + Sync {
    /// Fetch the feed endpoint of `descriptor`. Failures are per source and
    /// never affect other fetches.
    async fn fetch(&self, descriptor: Arc<FeedDescriptor>) -> Result<RawDocument>;
}

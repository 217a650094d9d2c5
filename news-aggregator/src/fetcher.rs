use crate::config::FetchConfig;
use crate::rss_utils::url::extract_domain;
use crate::traits::FetchFeed;
use crate::types::{AggregatorError, FeedDescriptor, FeedFormat, RawDocument, Result, SourceWarning};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use std::error::Error as StdError;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use url::Url;

/// HTTP implementation of [`FetchFeed`].
///
/// One strict client is shared by every source. A second client that skips
/// certificate verification exists only when some source asked for it, and
/// only those sources ever use it.
pub struct HttpFetcher {
    client: Client,
    insecure_client: Option<Client>,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig, allow_insecure_sources: bool) -> Result<Self> {
        config.validate()?;
        let client = Self::build_client(&config, false)?;
        let insecure_client = if allow_insecure_sources {
            Some(Self::build_client(&config, true)?)
        } else {
            None
        };

        Ok(Self { client, insecure_client, config })
    }

    fn build_client(config: &FetchConfig, accept_invalid_certs: bool) -> Result<Client> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(redirect)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(client)
    }

    fn max_body_bytes(&self) -> u64 {
        self.config.max_feed_size_mb as u64 * 1024 * 1024
    }

    fn client_for(&self, descriptor: &FeedDescriptor) -> Result<&Client> {
        if !descriptor.allow_invalid_certs {
            return Ok(&self.client);
        }
        match &self.insecure_client {
            Some(client) => {
                warn!(
                    "Fetching {} from {} without certificate verification",
                    descriptor.id,
                    extract_domain(&descriptor.feed).unwrap_or_else(|| descriptor.feed.clone())
                );
                Ok(client)
            }
            None => Err(AggregatorError::Config(format!(
                "source {} allows invalid certificates but the fetcher was built without an insecure client",
                descriptor.id
            ))),
        }
    }

    /// Map a transport error to the failure the rest of the pipeline reports.
    fn classify(&self, url: &str, err: reqwest::Error) -> AggregatorError {
        if err.is_timeout() {
            return AggregatorError::Timeout { seconds: self.config.timeout_seconds };
        }

        match trust_failure(&err) {
            Some(reason) => AggregatorError::TransportTrust { url: url.to_string(), reason },
            None => AggregatorError::Http(err),
        }
    }

    /// Both attempts share one deadline: the fallback only gets what the HTTP
    /// attempt left over.
    async fn fetch_body(&self, descriptor: &FeedDescriptor, deadline: Instant) -> Result<Vec<u8>> {
        let url = descriptor.feed.as_str();
        Url::parse(url)?;
        let client = self.client_for(descriptor)?;

        let response = client.get(url).send().await.map_err(|e| self.classify(url, e))?;
        let status = response.status();

        if status == StatusCode::FORBIDDEN {
            warn!("{} answered 403 for {}, retrying through fallback", url, descriptor.id);
            return self.fetch_with_fallback(descriptor, deadline).await;
        }

        if !status.is_success() {
            return Err(AggregatorError::Status { status: status.as_u16(), url: url.to_string() });
        }

        if let Some(content_length) = response.content_length() {
            self.check_size(content_length)?;
        }

        let body = response.bytes().await.map_err(|e| self.classify(url, e))?;
        self.check_size(body.len() as u64)?;
        Ok(body.to_vec())
    }

    fn check_size(&self, bytes: u64) -> Result<()> {
        if bytes > self.max_body_bytes() {
            let size_mb = bytes.div_ceil(1024 * 1024) as usize;
            return Err(AggregatorError::FeedTooLarge { size_mb });
        }
        Ok(())
    }

    /// Second and last attempt for sources that reject the HTTP client: hand the
    /// URL to an external program. The program is killed once the source
    /// deadline passes.
    async fn fetch_with_fallback(&self, descriptor: &FeedDescriptor, deadline: Instant) -> Result<Vec<u8>> {
        let url = descriptor.feed.as_str();
        let Some(program) = self.config.fallback_command.as_deref() else {
            return Err(AggregatorError::Status { status: StatusCode::FORBIDDEN.as_u16(), url: url.to_string() });
        };

        let seconds = self.config.timeout_seconds;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(AggregatorError::Timeout { seconds });
        }

        let mut command = Command::new(program);
        command
            .args(["--silent", "--show-error", "--fail", "--compressed"])
            .arg("--max-time")
            .arg(format!("{:.3}", remaining.as_secs_f64()))
            .arg("--max-filesize")
            .arg(self.max_body_bytes().to_string())
            .arg("--user-agent")
            .arg(&self.config.user_agent);
        if self.config.follow_redirects {
            command
                .arg("--location")
                .arg("--max-redirs")
                .arg(self.config.max_redirects.to_string());
        }
        if descriptor.allow_invalid_certs {
            command.arg("--insecure");
        }
        command
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(remaining, command.output())
            .await
            .map_err(|_| AggregatorError::Timeout { seconds })?
            .map_err(|e| AggregatorError::Forbidden { url: url.to_string(), reason: e.to_string() })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AggregatorError::Forbidden { url: url.to_string(), reason: stderr });
        }

        self.check_size(output.stdout.len() as u64)?;
        info!("Fallback fetched {} ({} bytes)", url, output.stdout.len());
        Ok(output.stdout)
    }
}

#[async_trait]
impl FetchFeed for HttpFetcher {
    async fn fetch(&self, descriptor: Arc<FeedDescriptor>) -> Result<RawDocument> {
        let started = Instant::now();
        let seconds = self.config.timeout_seconds;
        let budget = Duration::from_secs(seconds);
        debug!("Fetching feed: {} ({})", descriptor.feed, descriptor.id);

        let body = tokio::time::timeout(budget, self.fetch_body(&descriptor, started + budget))
            .await
            .map_err(|_| AggregatorError::Timeout { seconds })??;
        let format = FeedFormat::sniff(&body);
        info!(
            "Fetched {} ({} bytes, {}) in {}ms",
            descriptor.id,
            body.len(),
            format.map(|f| f.to_string()).unwrap_or_else(|| "unknown format".to_string()),
            started.elapsed().as_millis()
        );

        Ok(RawDocument { descriptor, format, body })
    }
}

/// The message of the first cause in `err`'s chain that reports a rejected
/// certificate, if any.
fn trust_failure(err: &(dyn StdError + 'static)) -> Option<String> {
    let mut source = Some(err);
    while let Some(cause) = source {
        let text = cause.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("self signed") || text.contains("self-signed") {
            return Some(cause.to_string());
        }
        source = cause.source();
    }
    None
}

/// Every source's result once all fetches have settled.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub documents: Vec<RawDocument>,
    pub warnings: Vec<SourceWarning>,
}

/// Fetch all sources with at most `workers` requests in flight. Documents
/// arrive in completion order. A failing source becomes a warning.
pub async fn fetch_all<F>(fetcher: &F, sources: &[Arc<FeedDescriptor>], workers: usize) -> FetchOutcome
where
    F: FetchFeed + ?Sized,
{
    info!("Fetching {} sources with {} workers", sources.len(), workers.max(1));

    let results: Vec<(String, Result<RawDocument>)> = stream::iter(sources.iter().cloned())
        .map(|descriptor| async move {
            let id = descriptor.id.clone();
            (id, fetcher.fetch(descriptor).await)
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut outcome = FetchOutcome::default();
    for (id, result) in results {
        match result {
            Ok(document) => outcome.documents.push(document),
            Err(e) => {
                error!("Failed to fetch {}: {}", id, e);
                outcome.warnings.push(SourceWarning::from_error(&id, &e));
            }
        }
    }

    info!(
        "Fetched {} of {} sources ({} failed)",
        outcome.documents.len(),
        sources.len(),
        outcome.warnings.len()
    );
    outcome
}

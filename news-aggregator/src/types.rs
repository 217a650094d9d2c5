use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

pub use interfaces::defs::{FeedDescriptor, FilterRuleSet, SourceCategory};

/// Wire shape of a fetched document, taken from its root element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
}

impl FeedFormat {
    /// Look at the first element of an XML document and decide which shape it is.
    pub fn sniff(body: &[u8]) -> Option<FeedFormat> {
        let text = String::from_utf8_lossy(body);
        let mut rest = text.trim_start_matches('\u{feff}').trim_start();

        // Skip the prolog: declarations, processing instructions, comments, doctype
        loop {
            if let Some(after) = rest.strip_prefix("<?") {
                rest = after.split_once("?>")?.1.trim_start();
            } else if let Some(after) = rest.strip_prefix("<!--") {
                rest = after.split_once("-->")?.1.trim_start();
            } else if let Some(after) = rest.strip_prefix("<!") {
                rest = after.split_once('>')?.1.trim_start();
            } else {
                break;
            }
        }

        let tag = rest.strip_prefix('<')?;
        let name_end = tag
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(tag.len());
        let name = &tag[..name_end];
        let local = name.rsplit(':').next().unwrap_or(name);

        match local {
            "rss" | "RDF" => Some(FeedFormat::Rss),
            "feed" => Some(FeedFormat::Atom),
            _ => None,
        }
    }
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedFormat::Rss => write!(f, "RSS"),
            FeedFormat::Atom => write!(f, "Atom"),
        }
    }
}

/// Payload produced by the fetcher and consumed once by the parser.
#[derive(Debug)]
pub struct RawDocument {
    pub descriptor: Arc<FeedDescriptor>,
    pub format: Option<FeedFormat>,
    pub body: Vec<u8>,
}

/// One normalized entry. Built by the parser; `link`, `normalized_link` and
/// `published_at` are never changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub title: String,
    pub link: String,
    pub normalized_link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub source_id: String,
    pub source_name: String,
    pub category: SourceCategory,
}

/// Why a source contributed nothing to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unreachable,
    TransportTrust,
    ParseFailure,
    InvalidRule,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Unreachable => "source-unreachable",
            FailureKind::TransportTrust => "transport-trust",
            FailureKind::ParseFailure => "parse-failure",
            FailureKind::InvalidRule => "invalid-rule",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceWarning {
    pub source_id: String,
    pub kind: FailureKind,
    pub message: String,
}

impl SourceWarning {
    pub fn from_error(source_id: &str, error: &AggregatorError) -> Self {
        Self {
            source_id: source_id.to_string(),
            kind: error.failure_kind(),
            message: error.to_string(),
        }
    }
}

impl From<&SourceWarning> for interfaces::defs::WarningRecord {
    fn from(warning: &SourceWarning) -> Self {
        Self {
            source_id: warning.source_id.clone(),
            kind: warning.kind.as_str().to_string(),
            message: warning.message.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Forbidden by {url}, fallback also failed: {reason}")]
    Forbidden { url: String, reason: String },

    #[error("Timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Certificate validation failed for {url}: {reason}")]
    TransportTrust { url: String, reason: String },

    #[error("Feed size exceeds limit: {size_mb}MB")]
    FeedTooLarge { size_mb: usize },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Unsupported feed format (root element is neither rss nor feed)")]
    UnsupportedFormat,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid filter pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Duplicate source id: {id}")]
    DuplicateSource { id: String },

    #[error("No sources configured")]
    NoSources,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AggregatorError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AggregatorError::TransportTrust { .. } => FailureKind::TransportTrust,
            AggregatorError::Parse(_) | AggregatorError::UnsupportedFormat => FailureKind::ParseFailure,
            AggregatorError::InvalidPattern { .. } => FailureKind::InvalidRule,
            _ => FailureKind::Unreachable,
        }
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;

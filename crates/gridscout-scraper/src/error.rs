use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlacesError {
    /// Transport failure: timeout, connection reset, TLS, truncated body.
    ///
    /// The URL is stripped before wrapping because it carries the API key.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("provider returned HTTP {status}")]
    ServerError { status: u16 },

    #[error("unexpected HTTP status {status} from provider")]
    UnexpectedStatus { status: u16 },

    #[error("rate limited by provider ({status})")]
    RateLimited { status: String },

    #[error("provider status {status}: {}", message.as_deref().unwrap_or("no message"))]
    ProviderStatus {
        status: String,
        message: Option<String>,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid provider base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("provider quota exceeded after {attempts} rate-limited attempts")]
    QuotaExceeded { attempts: u32 },
}

impl From<reqwest::Error> for PlacesError {
    fn from(err: reqwest::Error) -> Self {
        PlacesError::Http(err.without_url())
    }
}

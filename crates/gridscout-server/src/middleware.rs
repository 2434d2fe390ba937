//! Request tagging, bearer auth and per-client throttling for the HTTP API.
//!
//! Expected nesting, outermost first: [`request_id`], [`require_bearer_auth`],
//! [`enforce_rate_limit`]. The limiter reads the [`ClientId`] left by auth.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, RETRY_AFTER},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};
use uuid::Uuid;

use crate::api::ApiError;

const API_KEYS_VAR: &str = "GRIDSCOUT_API_KEYS";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;

type KeyDigest = [u8; 32];

/// Correlation id for one request, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    /// Reuses the caller's `x-request-id` when it is short printable ASCII,
    /// otherwise mints a `UUIDv4`.
    fn from_headers(headers: &HeaderMap) -> Self {
        let supplied = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| {
                !v.is_empty()
                    && v.len() <= MAX_REQUEST_ID_LEN
                    && v.bytes().all(|b| b.is_ascii_graphic())
            });
        Self(supplied.map_or_else(|| Uuid::new_v4().to_string(), str::to_owned))
    }
}

/// Identity a request is throttled under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientId {
    /// Digest of the bearer token that authenticated the request.
    Key(KeyDigest),
    /// Auth is disabled; every caller shares one budget.
    Anonymous,
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(digest) => {
                f.write_str("key:")?;
                digest[..4].iter().try_for_each(|b| write!(f, "{b:02x}"))
            }
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}

/// Bearer tokens accepted by [`require_bearer_auth`], held as SHA-256 digests.
#[derive(Debug, Clone)]
pub struct AuthState {
    token_digests: Arc<Vec<KeyDigest>>,
    pub enabled: bool,
}

impl AuthState {
    /// Reads comma-separated tokens from `GRIDSCOUT_API_KEYS`.
    ///
    /// # Errors
    ///
    /// Fails outside development when no token is configured.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var(API_KEYS_VAR).unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// # Errors
    ///
    /// Fails outside development when `raw` holds no token.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let mut token_digests: Vec<KeyDigest> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(digest)
            .collect();
        token_digests.sort_unstable();
        token_digests.dedup();

        let enabled = !token_digests.is_empty();
        if !enabled {
            anyhow::ensure!(
                is_development,
                "{API_KEYS_VAR} must list at least one bearer token outside development"
            );
            tracing::warn!("{API_KEYS_VAR} is empty; API auth is off for this development run");
        }

        Ok(Self {
            token_digests: Arc::new(token_digests),
            enabled,
        })
    }

    /// Digest of `token` when it is configured. Every stored digest is
    /// compared so timing does not reveal which one matched.
    fn authenticate(&self, token: &str) -> Option<KeyDigest> {
        let candidate = digest(token);
        let matched = self
            .token_digests
            .iter()
            .fold(Choice::from(0), |acc, known| acc | known[..].ct_eq(&candidate[..]));
        bool::from(matched).then_some(candidate)
    }
}

fn digest(token: &str) -> KeyDigest {
    Sha256::digest(token.as_bytes()).into()
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    used: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Allowed,
    Throttled { retry_after: Duration },
}

/// Fixed-window request budget kept separately for each [`ClientId`].
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: u32,
    window: Duration,
    windows: Arc<Mutex<HashMap<ClientId, Window>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Charges one request to `client` at `now`. Expired windows are dropped
    /// on the way so idle clients do not accumulate.
    fn admit(&self, client: &ClientId, now: Instant) -> Admission {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.retain(|_, w| now.saturating_duration_since(w.opened) < self.window);

        let current = windows.entry(client.clone()).or_insert(Window {
            opened: now,
            used: 0,
        });
        if current.used >= self.max_requests {
            let elapsed = now.saturating_duration_since(current.opened);
            return Admission::Throttled {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }
        current.used += 1;
        Admission::Allowed
    }
}

fn reject(req: &Request, code: &str, message: &str) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map_or_else(String::new, |id| id.0.clone());
    ApiError::new(request_id, code, message).into_response()
}

/// Tags the request with a [`RequestId`] and echoes it on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = RequestId::from_headers(req.headers());
    let echoed = HeaderValue::from_str(&id.0).ok();
    req.extensions_mut().insert(id);

    let mut res = next.run(req).await;
    if let Some(value) = echoed {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

/// Rejects requests without a configured bearer token and records the
/// caller's [`ClientId`] for the limiter.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let client = if auth.enabled {
        match bearer_token(req.headers()).and_then(|t| auth.authenticate(t)) {
            Some(digest) => ClientId::Key(digest),
            None => return reject(&req, "unauthorized", "missing or invalid bearer token"),
        }
    } else {
        ClientId::Anonymous
    };

    req.extensions_mut().insert(client);
    next.run(req).await
}

/// Answers 429 with `Retry-After` once the caller's window is spent.
pub async fn enforce_rate_limit(
    State(limits): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<ClientId>()
        .cloned()
        .unwrap_or(ClientId::Anonymous);

    match limits.admit(&client, Instant::now()) {
        Admission::Allowed => next.run(req).await,
        Admission::Throttled { retry_after } => {
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            tracing::warn!(client = %client, retry_after_secs = secs, "request throttled");
            let mut res = reject(&req, "rate_limited", "rate limit exceeded");
            res.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs.max(1)));
            res
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(name: &'static str, value: &'static str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_static(value));
        map
    }

    // -----------------------------------------------------------------------
    // Bearer tokens
    // -----------------------------------------------------------------------

    #[test]
    fn bearer_token_is_read_from_authorization() {
        let map = headers("authorization", "Bearer test-token");
        assert_eq!(bearer_token(&map), Some("test-token"));
    }

    #[test]
    fn other_schemes_and_blank_tokens_are_ignored() {
        assert_eq!(bearer_token(&headers("authorization", "Basic abc123")), None);
        assert_eq!(bearer_token(&headers("authorization", "Bearer   ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn empty_key_list_disables_auth_only_in_development() {
        let dev = AuthState::from_keys("", true).expect("dev should allow missing keys");
        assert!(!dev.enabled);
        assert!(AuthState::from_keys(" , ", false).is_err());
    }

    #[test]
    fn only_configured_tokens_authenticate() {
        let state = AuthState::from_keys("alpha, beta", false).expect("keys");
        assert!(state.enabled);
        assert_eq!(state.authenticate("alpha"), Some(digest("alpha")));
        assert!(state.authenticate("beta").is_some());
        assert!(state.authenticate("gamma").is_none());
        assert!(state.authenticate("alph").is_none());
    }

    // -----------------------------------------------------------------------
    // Request ids
    // -----------------------------------------------------------------------

    #[test]
    fn well_formed_request_id_is_reused() {
        let id = RequestId::from_headers(&headers("x-request-id", "trace-42"));
        assert_eq!(id.0, "trace-42");
    }

    #[test]
    fn unusable_request_id_is_replaced() {
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        let mut map = HeaderMap::new();
        map.insert(REQUEST_ID_HEADER, HeaderValue::from_str(&long).unwrap());
        let replaced = RequestId::from_headers(&map);
        assert_ne!(replaced.0, long);
        assert!(Uuid::parse_str(&replaced.0).is_ok());

        let spaced = RequestId::from_headers(&headers("x-request-id", "a b"));
        assert!(Uuid::parse_str(&spaced.0).is_ok());
    }

    // -----------------------------------------------------------------------
    // Rate limiting
    // -----------------------------------------------------------------------

    #[test]
    fn each_client_has_its_own_budget() {
        let limits = RateLimitState::new(2, Duration::from_secs(60));
        let now = Instant::now();
        let alice = ClientId::Key(digest("alice"));
        let bob = ClientId::Key(digest("bob"));

        assert_eq!(limits.admit(&alice, now), Admission::Allowed);
        assert_eq!(limits.admit(&alice, now), Admission::Allowed);
        assert!(matches!(
            limits.admit(&alice, now),
            Admission::Throttled { .. }
        ));
        assert_eq!(limits.admit(&bob, now), Admission::Allowed);
    }

    #[test]
    fn throttled_client_recovers_when_window_expires() {
        let limits = RateLimitState::new(1, Duration::from_secs(60));
        let start = Instant::now();
        let client = ClientId::Anonymous;

        assert_eq!(limits.admit(&client, start), Admission::Allowed);
        assert_eq!(
            limits.admit(&client, start + Duration::from_secs(45)),
            Admission::Throttled {
                retry_after: Duration::from_secs(15)
            }
        );
        assert_eq!(
            limits.admit(&client, start + Duration::from_secs(60)),
            Admission::Allowed
        );
    }

    #[test]
    fn expired_windows_are_pruned() {
        let limits = RateLimitState::new(5, Duration::from_secs(1));
        let start = Instant::now();
        for name in ["a", "b", "c"] {
            limits.admit(&ClientId::Key(digest(name)), start);
        }
        limits.admit(&ClientId::Anonymous, start + Duration::from_secs(2));
        assert_eq!(limits.windows.lock().unwrap().len(), 1);
    }

    #[test]
    fn client_id_display_is_a_short_fingerprint() {
        let shown = ClientId::Key([0xab; 32]).to_string();
        assert_eq!(shown, "key:abababab");
        assert_eq!(ClientId::Anonymous.to_string(), "anonymous");
    }
}

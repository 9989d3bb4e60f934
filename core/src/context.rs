//! Per-connection session state.
//!
//! # Design
//! A `SessionContext` is created from validated `Credentials` and lives for
//! as long as the caller keeps it. It has a single write phase: bootstrap
//! stores an `Authenticated` record exactly once and then flips the state to
//! `Ready`. After that every field is read-only, so the context is shared
//! behind an `Arc` and read concurrently by in-flight calls without locks.
//!
//! The lifecycle is `Unbootstrapped -> Bootstrapping -> Ready`, or
//! `Bootstrapping -> Failed` when the handshake fails. A `Failed` session can
//! be bootstrapped again because nothing was written. A `Ready` session is
//! never re-bootstrapped; `fresh` gives an unbootstrapped copy instead.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::locator::ServiceLocator;
use crate::query::{self, QueryValue};

pub const DEFAULT_LANGUAGE: &str = "vi";

/// Milliseconds since the Unix epoch, used for client ids and cache busting.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Cookie as supplied by the caller: a header string or an exported jar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cookie {
    Header(String),
    Jar(CookieJar),
}

/// Browser-exported cookie jar. Only `name` and `value` matter here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieJar {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub cookies: Vec<JarCookie>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JarCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
}

impl Cookie {
    /// Reduce to a single `Cookie` header value.
    pub fn to_header(&self) -> String {
        match self {
            Cookie::Header(raw) => raw.trim().to_string(),
            Cookie::Jar(jar) => jar
                .cookies
                .iter()
                .filter(|c| !c.name.trim().is_empty())
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

impl From<&str> for Cookie {
    fn from(raw: &str) -> Self {
        Cookie::Header(raw.to_string())
    }
}

/// Identity fields supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub imei: String,
    pub cookie: Cookie,
    pub user_agent: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// Validated identity, immutable for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub imei: String,
    pub cookie: String,
    pub user_agent: String,
    pub language: String,
}

impl TryFrom<Credentials> for Identity {
    type Error = Error;

    fn try_from(credentials: Credentials) -> Result<Self> {
        let cookie = credentials.cookie.to_header();
        let missing = [
            ("imei", credentials.imei.trim().is_empty()),
            ("cookie", cookie.is_empty()),
            ("userAgent", credentials.user_agent.trim().is_empty()),
        ]
        .into_iter()
        .filter(|(_, empty)| *empty)
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(Error::Configuration(format!(
                "missing required credentials: {}",
                missing.join(", ")
            )));
        }

        let language = credentials
            .language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Ok(Identity {
            imei: credentials.imei,
            cookie,
            user_agent: credentials.user_agent,
            language,
        })
    }
}

/// Caller-tunable options. Missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    pub api_type: u32,
    pub api_version: u32,
    pub login_base_url: String,
    pub origin: String,
    pub computer_name: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            api_type: 30,
            api_version: 645,
            login_base_url: "https://wpa.chat.zalo.me".to_string(),
            origin: "https://chat.zalo.me".to_string(),
            computer_name: "Web".to_string(),
        }
    }
}

impl Options {
    /// Overlay a JSON object onto the defaults.
    ///
    /// Unknown keys are ignored. A non-object overlay or a known key with the
    /// wrong type is a configuration error.
    pub fn with_overrides(overrides: &Value) -> Result<Self> {
        let Value::Object(overrides) = overrides else {
            return Err(Error::Configuration("options must be a JSON object".to_string()));
        };

        let mut merged = serde_json::to_value(Options::default())
            .map_err(|e| Error::Configuration(e.to_string()))?;
        if let Value::Object(base) = &mut merged {
            for (key, value) in overrides {
                base.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(merged).map_err(|e| Error::Configuration(format!("invalid options: {e}")))
    }
}

/// Bootstrap lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Unbootstrapped = 0,
    Bootstrapping = 1,
    Ready = 2,
    Failed = 3,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SessionState::Bootstrapping,
            2 => SessionState::Ready,
            3 => SessionState::Failed,
            _ => SessionState::Unbootstrapped,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Unbootstrapped => "unbootstrapped",
            SessionState::Bootstrapping => "bootstrapping",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
        })
    }
}

/// Negotiated symmetric key, base64 as issued by the server.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Everything the login handshake yields. Written once, then read-only.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub secret_key: SecretKey,
    pub uid: String,
    pub service_locator: ServiceLocator,
    pub push_endpoints: Vec<String>,
    pub settings: Value,
    pub extra_version: Option<Value>,
}

/// Session state shared by every endpoint bound to one connection.
#[derive(Debug)]
pub struct SessionContext {
    identity: Identity,
    options: Options,
    state: AtomicU8,
    auth: OnceLock<Authenticated>,
}

impl SessionContext {
    /// Validate `credentials` and build an unbootstrapped session.
    pub fn new(credentials: Credentials, options: Options) -> Result<Self> {
        Ok(Self {
            identity: Identity::try_from(credentials)?,
            options,
            state: AtomicU8::new(SessionState::Unbootstrapped as u8),
            auth: OnceLock::new(),
        })
    }

    /// Unbootstrapped session with the same identity and options.
    pub fn fresh(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            options: self.options.clone(),
            state: AtomicU8::new(SessionState::Unbootstrapped as u8),
            auth: OnceLock::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn imei(&self) -> &str {
        &self.identity.imei
    }

    pub fn cookie(&self) -> &str {
        &self.identity.cookie
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The handshake result, or a misuse error when the session is not `Ready`.
    pub fn authenticated(&self) -> Result<&Authenticated> {
        let state = self.state();
        match (state, self.auth.get()) {
            (SessionState::Ready, Some(auth)) => Ok(auth),
            _ => Err(Error::Misuse {
                operation: "encrypted call",
                state,
            }),
        }
    }

    pub fn uid(&self) -> Result<&str> {
        Ok(&self.authenticated()?.uid)
    }

    /// Claim the bootstrap phase. Only `Unbootstrapped` and `Failed` sessions
    /// may enter it.
    pub(crate) fn begin_bootstrap(&self) -> Result<()> {
        for from in [SessionState::Unbootstrapped, SessionState::Failed] {
            if self
                .state
                .compare_exchange(
                    from as u8,
                    SessionState::Bootstrapping as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return Ok(());
            }
        }
        Err(Error::Misuse {
            operation: "bootstrap",
            state: self.state(),
        })
    }

    /// Store the handshake result and become `Ready`.
    pub(crate) fn complete_bootstrap(&self, auth: Authenticated) -> Result<()> {
        if self.auth.set(auth).is_err() {
            self.state.store(SessionState::Failed as u8, Ordering::Release);
            return Err(Error::Misuse {
                operation: "bootstrap",
                state: SessionState::Ready,
            });
        }
        self.state.store(SessionState::Ready as u8, Ordering::Release);
        Ok(())
    }

    pub(crate) fn fail_bootstrap(&self) {
        self.state.store(SessionState::Failed as u8, Ordering::Release);
    }

    /// Headers sent with every request of this session.
    pub fn headers(&self) -> Vec<(String, String)> {
        let origin = self.options.origin.trim_end_matches('/');
        vec![
            ("accept".to_string(), "application/json, text/plain, */*".to_string()),
            ("accept-language".to_string(), "en-US,en;q=0.9".to_string()),
            ("cookie".to_string(), self.identity.cookie.clone()),
            ("origin".to_string(), origin.to_string()),
            ("referer".to_string(), format!("{origin}/")),
            ("user-agent".to_string(), self.identity.user_agent.clone()),
        ]
    }

    /// Build a feature URL: merge `params`, then stamp the API version
    /// parameters unless the URL already carries them.
    pub fn feature_url(&self, base: &str, params: &[(&str, QueryValue)]) -> Result<String> {
        let url = query::build_url(base, params)?;
        query::fill_missing(
            &url,
            &[
                ("zpw_ver", self.options.api_version.into()),
                ("zpw_type", self.options.api_type.into()),
            ],
        )
    }
}

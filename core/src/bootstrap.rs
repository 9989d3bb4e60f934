//! Login handshake that turns an unbootstrapped session into a ready one.
//!
//! # Design
//! Two unauthenticated GET requests are made against the login host: login
//! info (uid, secret key, service map) and server info (settings). Both
//! replies are validated in full before anything is written to the session,
//! so a failed handshake never leaves partial state behind. Every failure is
//! reported as `Error::Auth`, transport failures included.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::context::{now_millis, Authenticated, SecretKey, SessionContext};
use crate::crypto;
use crate::error::{AuthError, Error, Result};
use crate::http::{HttpRequest, Transport};
use crate::locator::ServiceLocator;
use crate::query::{self, QueryValue};
use crate::resolver::{self, Reply};

const LOGIN_INFO_PATH: &str = "/api/login/getLoginInfo";
const SERVER_INFO_PATH: &str = "/api/login/getServerInfo";

#[derive(Debug, Deserialize)]
struct LoginInfo {
    #[serde(default, deserialize_with = "string_or_number")]
    uid: Option<String>,
    #[serde(default)]
    zpw_enk: Option<String>,
    #[serde(default)]
    zpw_service_map_v3: HashMap<String, Vec<String>>,
    #[serde(default)]
    zpw_ws: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ServerInfo {
    #[serde(default)]
    settings: Option<Value>,
    /// Misspelling the server has been observed to send instead of `settings`.
    #[serde(default)]
    setttings: Option<Value>,
    #[serde(default)]
    extra_ver: Option<Value>,
}

impl ServerInfo {
    fn settings(&mut self) -> Option<Value> {
        if let Some(settings) = self.settings.take().filter(|v| !v.is_null()) {
            return Some(settings);
        }
        let fallback = self.setttings.take().filter(|v| !v.is_null());
        if fallback.is_some() {
            tracing::warn!("server info has no `settings`, using `setttings`");
        }
        fallback
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Run the login handshake and move `session` to `Ready`.
///
/// Only `Unbootstrapped` and `Failed` sessions may be bootstrapped; anything
/// else is a misuse error and leaves the session untouched.
pub async fn bootstrap<T: Transport + ?Sized>(session: &SessionContext, transport: &T) -> Result<()> {
    session.begin_bootstrap()?;

    match handshake(session, transport).await {
        Ok(auth) => {
            let uid = auth.uid.clone();
            session.complete_bootstrap(auth)?;
            tracing::info!(%uid, "logged in");
            Ok(())
        }
        Err(err) => {
            session.fail_bootstrap();
            tracing::warn!(error = %err, "login handshake failed");
            Err(Error::Auth(err))
        }
    }
}

async fn handshake<T: Transport + ?Sized>(
    session: &SessionContext,
    transport: &T,
) -> std::result::Result<Authenticated, AuthError> {
    let login: LoginInfo = fetch(session, transport, LOGIN_INFO_PATH, login_query(session)).await?;
    tracing::debug!("received login info");

    let uid = login
        .uid
        .filter(|uid| !uid.is_empty())
        .ok_or(AuthError::MissingField("uid"))?;
    let secret_key = login
        .zpw_enk
        .filter(|key| !key.is_empty())
        .ok_or(AuthError::MissingField("zpw_enk"))?;
    if !crypto::is_valid_key(&secret_key) {
        return Err(AuthError::MalformedReply("zpw_enk is not a usable key".to_string()));
    }
    let service_locator = ServiceLocator::new(login.zpw_service_map_v3);
    if service_locator.is_empty() {
        return Err(AuthError::MissingField("zpw_service_map_v3"));
    }
    tracing::debug!(services = ?service_locator.services().collect::<Vec<_>>(), "service map");

    let mut server: ServerInfo = fetch(session, transport, SERVER_INFO_PATH, server_query(session)).await?;
    tracing::debug!("received server info");
    let settings = server.settings().ok_or(AuthError::MissingField("settings"))?;

    Ok(Authenticated {
        secret_key: SecretKey::new(secret_key),
        uid,
        service_locator,
        push_endpoints: login.zpw_ws,
        settings,
        extra_version: server.extra_ver,
    })
}

fn login_query(session: &SessionContext) -> Vec<(&'static str, QueryValue)> {
    let mut query = server_query(session);
    query.push(("language", QueryValue::from(session.identity().language.as_str())));
    query.push(("ts", QueryValue::Int(now_millis())));
    query.push(("nretry", QueryValue::Int(0)));
    query
}

fn server_query(session: &SessionContext) -> Vec<(&'static str, QueryValue)> {
    let options = session.options();
    vec![
        ("imei", session.imei().into()),
        ("type", options.api_type.into()),
        ("client_version", options.api_version.into()),
        ("computer_name", options.computer_name.clone().into()),
    ]
}

async fn fetch<T, R>(
    session: &SessionContext,
    transport: &T,
    path: &str,
    params: Vec<(&'static str, QueryValue)>,
) -> std::result::Result<R, AuthError>
where
    T: Transport + ?Sized,
    R: DeserializeOwned,
{
    let base = format!("{}{path}", session.options().login_base_url.trim_end_matches('/'));
    let url = query::build_url(&base, &params).map_err(|e| AuthError::MalformedReply(e.to_string()))?;

    let response = transport
        .execute(HttpRequest::get(url, session.headers()))
        .await
        .map_err(AuthError::Transport)?;

    let reply = resolver::decode(response, None).map_err(|e| match e {
        Error::Api { code, message } => AuthError::Rejected {
            code: code.unwrap_or_default(),
            message,
        },
        other => AuthError::MalformedReply(other.to_string()),
    })?;
    classify(reply)
}

fn classify<R: DeserializeOwned>(reply: Reply) -> std::result::Result<R, AuthError> {
    resolver::resolve(reply).map_err(|e| match e {
        Error::Api { code, message } => AuthError::Rejected {
            code: code.unwrap_or_default(),
            message,
        },
        other => AuthError::MalformedReply(other.to_string()),
    })
}

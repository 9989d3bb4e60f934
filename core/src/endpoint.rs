//! Binding of individual endpoints to a session and transport.
//!
//! # Design
//! An endpoint is a concrete type implementing `Endpoint`. It describes only
//! what is specific to it: which service and path it targets, which
//! parameters it sends, which nonzero status codes it tolerates, and how the
//! payload becomes its output. Everything shared (session checks, URL
//! building, encryption, the HTTP call, classification) lives in
//! `BoundEndpoint::call`, so no endpoint re-implements any of it.
//!
//! `EndpointFactory` captures the session and transport once and binds any
//! number of endpoints to them.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::SessionContext;
use crate::crypto;
use crate::error::{Error, Result};
use crate::http::{HttpRequest, Transport};
use crate::query::Query;
use crate::resolver::{self, Reply};

/// Where an endpoint call goes: a service name, a path on that service's base
/// address, and extra query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub service: &'static str,
    pub path: String,
    pub query: Query,
}

impl Route {
    pub fn new(service: &'static str, path: impl Into<String>) -> Self {
        Self {
            service,
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }
}

/// One callable operation of the platform API.
pub trait Endpoint: Send + Sync {
    type Input;
    type Params: Serialize;
    type Output: DeserializeOwned;

    /// Nonzero status codes this endpoint treats as partial success.
    const ACCEPTED_CODES: &'static [i64] = &[];

    fn route(&self, input: &Self::Input) -> Route;

    fn params(&self, input: &Self::Input, session: &SessionContext) -> Result<Self::Params>;

    /// Shape the classified reply. Defaults to deserializing `data`.
    fn output(&self, reply: Reply) -> Result<Self::Output> {
        resolver::payload(reply)
    }
}

/// Captures a session and transport for binding endpoints.
#[derive(Debug)]
pub struct EndpointFactory<T> {
    session: Arc<SessionContext>,
    transport: Arc<T>,
}

impl<T> Clone for EndpointFactory<T> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> EndpointFactory<T> {
    pub fn new(session: Arc<SessionContext>, transport: Arc<T>) -> Self {
        Self { session, transport }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn bind<E: Endpoint>(&self, endpoint: E) -> BoundEndpoint<E, T> {
        BoundEndpoint {
            endpoint,
            session: Arc::clone(&self.session),
            transport: Arc::clone(&self.transport),
        }
    }
}

/// An endpoint with its session and transport attached.
#[derive(Debug)]
pub struct BoundEndpoint<E, T> {
    endpoint: E,
    session: Arc<SessionContext>,
    transport: Arc<T>,
}

impl<E: Endpoint, T: Transport> BoundEndpoint<E, T> {
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Build the encrypted request for `input` without sending it.
    ///
    /// Fails with a misuse error before the session is `Ready`.
    pub fn request(&self, input: &E::Input) -> Result<HttpRequest> {
        let auth = self.session.authenticated()?;

        let route = self.endpoint.route(input);
        let base = auth.service_locator.resolve(route.service)?;
        let url = self
            .session
            .feature_url(&format!("{base}{}", route.path), &route.query)?;

        let params = self.endpoint.params(input, &self.session)?;
        let params = serde_json::to_string(&params).map_err(|e| Error::Serialization(e.to_string()))?;
        let encrypted = crypto::encrypt(auth.secret_key.as_str(), &params)
            .ok_or(Error::Encryption("failed to encrypt params"))?;

        Ok(HttpRequest::post_form(url, self.session.headers(), &[("params", encrypted.as_str())]))
    }

    /// Execute the endpoint: build, send, decode and classify.
    pub async fn call(&self, input: E::Input) -> Result<E::Output> {
        let request = self.request(&input)?;
        tracing::debug!(url = %request.url, "dispatching endpoint call");

        let response = self.transport.execute(request).await?;

        let auth = self.session.authenticated()?;
        let reply = resolver::decode(response, Some(auth.secret_key.as_str()))?;
        resolver::resolve_accepting(reply, E::ACCEPTED_CODES, |reply| self.endpoint.output(reply))
    }
}

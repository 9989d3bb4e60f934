//! Client runtime for the chat platform's private web API.
//!
//! # Overview
//! Every feature call shares one pipeline: a `SessionContext` bootstrapped
//! once by the login handshake, an `EndpointFactory` that binds endpoint
//! types to that session, AES encryption of the request parameters, and a
//! single response resolver that turns replies into payloads or errors.
//!
//! # Design
//! - Host-does-IO: the pipeline builds `HttpRequest` values and consumes
//!   `HttpResponse` values. The round-trip goes through the `Transport`
//!   trait; `HttpClient` is the bundled reqwest implementation.
//! - The session is written once during bootstrap and only read afterwards,
//!   so it is shared as `Arc<SessionContext>` without locks.
//! - Endpoints are concrete types implementing `Endpoint`. They only narrow
//!   classification by naming exact status codes they accept.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api;
pub mod bootstrap;
pub mod context;
pub mod crypto;
pub mod endpoint;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod locator;
pub mod query;
pub mod resolver;

pub use api::Api;
pub use bootstrap::bootstrap;
pub use context::{Cookie, CookieJar, Credentials, Options, SessionContext, SessionState};
pub use endpoint::{BoundEndpoint, Endpoint, EndpointFactory, Route};
pub use error::{AuthError, Error, Result};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use locator::ServiceLocator;
pub use query::{build_url, QueryValue};
pub use resolver::{Reply, ReplyError};

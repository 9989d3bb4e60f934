//! Caller-facing handle that bundles a session with its bound endpoints.

use std::sync::Arc;

use crate::bootstrap::bootstrap;
use crate::context::SessionContext;
use crate::endpoint::{BoundEndpoint, EndpointFactory};
use crate::endpoints::{BlockUser, ForwardMessage, ForwardPayload, ForwardRequest, ForwardResponse, ThreadKind, UnblockUser};
use crate::error::Result;
use crate::http::Transport;

/// Logged-in API surface.
///
/// Endpoints not exposed as methods can be bound through `factory()`.
#[derive(Debug)]
pub struct Api<T> {
    factory: EndpointFactory<T>,
    block_user: BoundEndpoint<BlockUser, T>,
    unblock_user: BoundEndpoint<UnblockUser, T>,
    forward_message: BoundEndpoint<ForwardMessage, T>,
}

impl<T: Transport> Api<T> {
    /// Bootstrap `session` over `transport` and bind the endpoints to it.
    pub async fn login(session: Arc<SessionContext>, transport: Arc<T>) -> Result<Self> {
        bootstrap(&session, transport.as_ref()).await?;
        Ok(Self::new(session, transport))
    }

    /// Bind the endpoints without bootstrapping. Calls fail with a misuse
    /// error until the session is `Ready`.
    pub fn new(session: Arc<SessionContext>, transport: Arc<T>) -> Self {
        let factory = EndpointFactory::new(session, transport);
        Self {
            block_user: factory.bind(BlockUser),
            unblock_user: factory.bind(UnblockUser),
            forward_message: factory.bind(ForwardMessage),
            factory,
        }
    }

    pub fn factory(&self) -> &EndpointFactory<T> {
        &self.factory
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        self.factory.session()
    }

    /// Uid of the logged-in account.
    pub fn own_id(&self) -> Result<&str> {
        self.session().uid()
    }

    pub fn cookie(&self) -> &str {
        self.session().cookie()
    }

    pub async fn block_user(&self, user_id: impl Into<String>) -> Result<()> {
        self.block_user.call(user_id.into()).await
    }

    pub async fn unblock_user(&self, user_id: impl Into<String>) -> Result<()> {
        self.unblock_user.call(user_id.into()).await
    }

    /// Forward `payload` to every id in `targets`. Partial failures still
    /// return the deliveries that succeeded.
    pub async fn forward_message(
        &self,
        targets: Vec<String>,
        kind: ThreadKind,
        payload: ForwardPayload,
    ) -> Result<ForwardResponse> {
        self.forward_message
            .call(ForwardRequest { targets, kind, payload })
            .await
    }
}

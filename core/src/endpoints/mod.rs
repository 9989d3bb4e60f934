//! Platform endpoints built on the shared pipeline.

pub mod forward;
pub mod friend;

pub use forward::{AttachmentInfo, ForwardMessage, ForwardPayload, ForwardRequest, ForwardResponse, ForwardResult, ThreadKind};
pub use friend::{BlockUser, UnblockUser};

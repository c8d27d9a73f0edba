//! # agora-core
//!
//! Shared vocabulary for the Agora realtime hub.
//!
//! - **Identity newtypes**: [`UserId`] (platform user) and [`ConnectionId`]
//!   (one accepted socket) so the two never get mixed up
//! - **Wire types**: outbound [`Message`] / [`Event`] and inbound [`Inbound`]
//! - **Envelope codec**: [`codec::decode_inbound`] and [`codec::encode_outbound`]
//! - **Identity collaborator types**: [`Identity`] and [`Role`], produced by
//!   whatever verifies bearer tokens before a session is admitted

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;
pub mod identity;
pub mod ids;
pub mod wire;

pub use codec::{decode_inbound, encode_outbound};
pub use errors::CodecError;
pub use identity::{Identity, Role};
pub use ids::{ConnectionId, UserId};
pub use wire::{ChatMessage, Event, Inbound, Message, Receipt, TypingNotice, TypingRequest};

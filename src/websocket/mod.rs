//! # WebSocket Channels
//!
//! Channels are named topics with an authorization gate and a set of live
//! connections. Channel names are route patterns: `rooms/:id` addresses a
//! family of channels using the same matcher as HTTP routes, and every
//! message on the wire is the JSON envelope `{"channel": ..., "payload": ...}`
//! in both directions.
//!
//! The broadcaster is transport-agnostic (connections are outbox handles);
//! [`listener`] binds it to real sockets with a `may` accept loop and the
//! `tungstenite` protocol implementation.

mod core;
pub mod listener;

pub use core::{
    Channel, ChannelBroadcaster, ConnectionHandle, ConnectionInfo, Envelope, Subscription,
};

//! noderpc-ws: persistent WebSocket JSON-RPC transport.
//!
//! # Features
//! - One background task owns the socket; callers talk to it over channels
//! - Replies are matched to requests in send order
//! - A peer close surfaces as `ConnectionClosed`; reconnecting is left to the client

pub mod client;

pub use client::WsTransport;

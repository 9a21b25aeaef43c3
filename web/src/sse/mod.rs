//! SSE HTTP handler for the web layer.
//!
//! The connection registry, event types and domain event handler live in the
//! `sse` crate; this module only turns a registered connection into a
//! streaming response and drives presence transitions around it.

pub(crate) mod handler;

//! Typed parameters for endpoint inputs.
//!
//! Request bodies and query strings are deserialized into these structs
//! before any domain logic runs, so malformed input is rejected by the
//! extractor rather than inside a controller.

pub(crate) mod attachment;
pub(crate) mod block;
pub(crate) mod message;
pub(crate) mod relationship;

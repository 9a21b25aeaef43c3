//! Server-Sent Events (SSE) infrastructure for realtime delivery and presence.
//!
//! # Architecture
//!
//! - **Many connections per user**: a user may hold several concurrent SSE
//!   connections (tabs, devices). Every user-scoped event reaches all of them.
//! - **Dual-index registry**: O(1) lookups for both connection management and
//!   user-scoped routing via separate DashMap indices.
//! - **Presence**: the user index is also the presence table. The first
//!   connection of a user reports an online transition; the last disconnect
//!   reports a pending offline transition that the caller settles after a
//!   grace period, so quick reconnects do not flap.
//! - **Ephemeral events**: a user with no live connection misses the event and
//!   catches up through the HTTP API.
//! - **Non-blocking push**: connection channels are unbounded, so a slow
//!   consumer never holds up the sender.
//!
//! # Message Flow
//!
//! 1. Client opens `/sse` with a bearer token
//! 2. Connection registered in the ConnectionRegistry
//! 3. A domain operation publishes a `DomainEvent`
//! 4. `SseDomainEventHandler` maps it to an `Event` and a `MessageScope`
//! 5. Manager serializes the event once into a `Frame` and pushes it to each
//!   matching connection
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry and presence transitions
//! - `manager`: High-level message routing (delegates to ConnectionRegistry)
//! - `message`: Event catalogue, scopes and wire frames
//! - `domain_event_handler`: DomainEvent to SSE routing

pub mod connection;
pub mod domain_event_handler;
pub mod manager;
pub mod message;

pub use domain_event_handler::SseDomainEventHandler;
pub use manager::Manager;

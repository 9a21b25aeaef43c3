use uuid::Uuid;

pub mod message_type;
pub mod messages;
pub mod relationship_status;
pub mod relationships;
pub mod users;

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = Uuid;

/// Identities are opaque, stable strings issued by the identity provider.
pub type UserId = String;

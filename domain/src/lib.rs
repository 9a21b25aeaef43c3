//! Business logic for relationship-gated messaging.
//!
//! Items from `entity_api` are re-exported so that consumers of `domain` never
//! need to depend on the persistence crates directly.
pub use entity_api::{message_type, messages, relationship_status, relationships, users, Id, UserId};

pub use events;

pub mod attachment;
pub mod error;
pub mod identity;
pub mod message;
pub mod presence;
pub mod relationship;
pub mod user;

/// Serializes a model for an event payload. Failure only costs the realtime
/// notification, never the operation that produced it.
pub(crate) fn event_payload<T: serde::Serialize>(value: &T) -> Option<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| log::warn!("Failed to serialize event payload: {e}"))
        .ok()
}

#[cfg(test)]
pub(crate) mod test_utils {
    use crate::events::{DomainEvent, EventHandler, EventPublisher};
    use crate::relationship_status::RelationshipStatus;
    use async_trait::async_trait;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectOptions, Database, DatabaseConnection};
    use std::sync::{Arc, Mutex};

    /// Fresh, migrated in-memory database with alice, bob, carol and dave.
    pub(crate) async fn setup_with_users() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        for id in ["alice", "bob", "carol", "dave"] {
            entity_api::user::create(&db, id, id).await.unwrap();
        }
        db
    }

    pub(crate) async fn befriend(db: &DatabaseConnection, a: &str, b: &str) {
        entity_api::relationship::create(db, a, b, RelationshipStatus::Accepted)
            .await
            .unwrap();
    }

    /// Collects every published event.
    #[derive(Default)]
    pub(crate) struct EventRecorder {
        seen: Mutex<Vec<DomainEvent>>,
    }

    impl EventRecorder {
        pub(crate) fn publisher(self: &Arc<Self>) -> EventPublisher {
            EventPublisher::new().with_handler(self.clone())
        }

        pub(crate) fn events(&self) -> Vec<DomainEvent> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventHandler for EventRecorder {
        async fn handle(&self, event: &DomainEvent) {
            self.seen.lock().unwrap().push(event.clone());
        }
    }
}

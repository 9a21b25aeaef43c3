use chrono::Utc;
use log::*;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

pub use entity::{
    message_type, messages, relationship_status, relationships, users, Id, UserId,
};

pub mod error;
pub mod message;
pub mod relationship;
pub mod user;

/// Seeds a development database with a handful of identities and a small
/// friendship graph so the realtime flows can be exercised by hand.
pub async fn seed_database(db: &DatabaseConnection) -> Result<(), error::Error> {
    let now = Utc::now();

    for (id, display_name) in [
        ("alice", "Alice"),
        ("bob", "Bob"),
        ("carol", "Carol"),
        ("dave", "Dave"),
    ] {
        if user::exists(db, id).await? {
            debug!("Seed user {id} already exists, skipping");
            continue;
        }

        users::ActiveModel {
            id: Set(id.to_owned()),
            display_name: Set(display_name.to_owned()),
            created_at: Set(now.into()),
        }
        .insert(db)
        .await?;
    }

    // Alice and Bob are friends, Carol is waiting on Alice, Dave blocked Carol.
    for (requester, recipient, status) in [
        ("alice", "bob", relationship_status::RelationshipStatus::Accepted),
        ("carol", "alice", relationship_status::RelationshipStatus::Pending),
        ("dave", "carol", relationship_status::RelationshipStatus::Blocked),
    ] {
        if relationship::find_between(db, requester, recipient)
            .await?
            .is_none()
        {
            relationship::create(db, requester, recipient, status).await?;
        }
    }

    Ok(())
}

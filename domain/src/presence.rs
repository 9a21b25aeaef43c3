//! Presence announcements.
//!
//! Live connection tracking belongs to the realtime layer; this module decides
//! who hears about a transition and who may ask about one.

use crate::error::Error;
use crate::events::{DomainEvent, EventPublisher};
use crate::relationship::{find_between, find_friends};
use crate::relationship_status::RelationshipStatus;
use crate::users;
use log::*;
use sea_orm::DatabaseConnection;

/// Tells every accepted friend of `user_id` that it went online or offline.
pub async fn announce(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    user_id: &str,
    is_online: bool,
) -> Result<(), Error> {
    announce_if(db, event_publisher, user_id, is_online, || true).await
}

/// Like [`announce`], but publishes only if `still_current` holds once the
/// audience is known. Lets the caller drop a transition that a later connect
/// or disconnect has already superseded.
pub async fn announce_if(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    user_id: &str,
    is_online: bool,
    still_current: impl Fn() -> bool,
) -> Result<(), Error> {
    let notify_user_ids: Vec<_> = find_friends(db, user_id)
        .await?
        .into_iter()
        .filter(|friend| !users::is_assistant(friend))
        .collect();

    debug!(
        "Announcing {user_id} {} to {} friend(s)",
        if is_online { "online" } else { "offline" },
        notify_user_ids.len()
    );

    if !still_current() {
        debug!("Dropping stale presence announcement for {user_id}");
        return Ok(());
    }

    event_publisher
        .publish(DomainEvent::PresenceChanged {
            user_id: user_id.to_owned(),
            is_online,
            notify_user_ids,
        })
        .await;

    Ok(())
}

/// Whether `viewer_id` may see the presence of `subject_id`: itself, or an
/// accepted friend.
pub async fn can_view(db: &DatabaseConnection, viewer_id: &str, subject_id: &str) -> Result<bool, Error> {
    if viewer_id == subject_id {
        return Ok(true);
    }

    Ok(find_between(db, viewer_id, subject_id)
        .await?
        .is_some_and(|existing| existing.status == RelationshipStatus::Accepted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::{block, ensure_assistant_relationship};
    use crate::test_utils::{befriend, setup_with_users, EventRecorder};
    use std::sync::Arc;

    #[tokio::test]
    async fn announce_reaches_accepted_friends_only() -> Result<(), Error> {
        let db = setup_with_users().await;
        befriend(&db, "alice", "bob").await;
        befriend(&db, "carol", "alice").await;
        block(&db, "dave", "alice").await?;
        ensure_assistant_relationship(&db, "alice").await?;
        let recorder = Arc::new(EventRecorder::default());

        announce(&db, &recorder.publisher(), "alice", true).await?;

        match &recorder.events()[..] {
            [DomainEvent::PresenceChanged {
                user_id,
                is_online,
                notify_user_ids,
            }] => {
                let mut notified = notify_user_ids.clone();
                notified.sort();
                assert_eq!(user_id, "alice");
                assert!(*is_online);
                assert_eq!(notified, vec!["bob".to_string(), "carol".to_string()]);
            }
            other => panic!("unexpected events: {other:?}"),
        }

        Ok(())
    }

    #[tokio::test]
    async fn superseded_transition_is_not_published() -> Result<(), Error> {
        let db = setup_with_users().await;
        befriend(&db, "alice", "bob").await;
        let recorder = Arc::new(EventRecorder::default());

        announce_if(&db, &recorder.publisher(), "alice", false, || false).await?;
        assert!(recorder.events().is_empty());

        announce_if(&db, &recorder.publisher(), "alice", false, || true).await?;
        assert_eq!(recorder.events().len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn only_self_and_friends_can_view_presence() -> Result<(), Error> {
        let db = setup_with_users().await;
        befriend(&db, "alice", "bob").await;
        block(&db, "dave", "alice").await?;

        assert!(can_view(&db, "alice", "alice").await?);
        assert!(can_view(&db, "bob", "alice").await?);
        assert!(!can_view(&db, "carol", "alice").await?);
        assert!(!can_view(&db, "dave", "alice").await?);

        Ok(())
    }
}

//! Relationship state machine.
//!
//! Every unordered pair of identities has at most one relationship row. A pair
//! moves `none -> Pending -> Accepted | Rejected`, either party may block at
//! any time, only the blocker may lift a block, and removal deletes a
//! non-blocked relationship. The reserved assistant identity can be neither
//! blocked, unblocked nor removed.

use crate::error::{Error, RejectedKind};
use crate::events::{DomainEvent, EventPublisher};
use crate::relationship_status::RelationshipStatus;
use crate::relationships::Model;
use crate::{event_payload, user, users};
use entity_api::error::EntityApiErrorKind;
use entity_api::relationship;
use log::*;
use sea_orm::{DatabaseConnection, TransactionTrait};

pub use entity_api::relationship::{find_between, find_by_id};

/// Creates a `Pending` request from `requester_id` to `recipient_id` and
/// notifies the recipient.
pub async fn send_request(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    requester_id: &str,
    recipient_id: &str,
) -> Result<Model, Error> {
    validate_pair(requester_id, recipient_id)?;
    if users::is_assistant(recipient_id) || users::is_assistant(requester_id) {
        return Err(Error::rejected(
            RejectedKind::Forbidden,
            "relationships with the assistant are managed automatically",
        ));
    }
    require_user(db, recipient_id).await?;

    if relationship::find_between(db, requester_id, recipient_id)
        .await?
        .is_some()
    {
        return Err(already_exists());
    }

    // A concurrent request for the same pair loses on the unique pair key
    let created = relationship::create(db, requester_id, recipient_id, RelationshipStatus::Pending)
        .await
        .map_err(|e| {
            if e.error_kind == EntityApiErrorKind::RecordAlreadyExists {
                already_exists()
            } else {
                e.into()
            }
        })?;

    info!("Friend request {} sent from {requester_id} to {recipient_id}", created.id);

    if let Some(payload) = event_payload(&created) {
        event_publisher
            .publish(DomainEvent::FriendRequestReceived {
                relationship: payload,
                notify_user_ids: vec![recipient_id.to_owned()],
            })
            .await;
    }

    Ok(created)
}

/// Accepts or rejects a pending request. Only the stored recipient may answer,
/// and only while the request is still pending.
pub async fn respond(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    relationship_id: crate::Id,
    responding_id: &str,
    accept: bool,
) -> Result<Model, Error> {
    let existing = relationship::find_by_id(db, relationship_id)
        .await
        .map_err(|e| {
            if e.error_kind == EntityApiErrorKind::RecordNotFound {
                Error::rejected(RejectedKind::NotFound, "relationship not found")
            } else {
                e.into()
            }
        })?;

    if existing.recipient_id != responding_id {
        warn!(
            "User {responding_id} tried to respond to relationship {} addressed to {}",
            existing.id, existing.recipient_id
        );
        return Err(Error::rejected(
            RejectedKind::Forbidden,
            "only the recipient can respond to this request",
        ));
    }

    if existing.status != RelationshipStatus::Pending {
        return Err(no_pending_request());
    }

    let status = if accept {
        RelationshipStatus::Accepted
    } else {
        RelationshipStatus::Rejected
    };

    // Lost a race with another response to the same request
    let updated = relationship::transition_status(db, existing, RelationshipStatus::Pending, status)
        .await
        .map_err(|e| {
            if e.error_kind == EntityApiErrorKind::RecordNotUpdated {
                no_pending_request()
            } else {
                e.into()
            }
        })?;

    info!("Relationship {} is now {}", updated.id, updated.status);

    if updated.status == RelationshipStatus::Accepted {
        if let Some(payload) = event_payload(&updated) {
            event_publisher
                .publish(DomainEvent::FriendRequestAccepted {
                    relationship: payload,
                    notify_user_ids: vec![
                        updated.requester_id.clone(),
                        updated.recipient_id.clone(),
                    ],
                })
                .await;
        }
    }

    Ok(updated)
}

/// Blocks `target_id` on behalf of `blocker_id`, replacing whatever
/// relationship the pair had. The resulting row always has the blocker as
/// its requester.
pub async fn block(db: &DatabaseConnection, blocker_id: &str, target_id: &str) -> Result<Model, Error> {
    validate_pair(blocker_id, target_id)?;
    forbid_assistant(blocker_id, target_id, "the assistant cannot be blocked")?;
    require_user(db, target_id).await?;

    let txn = db.begin().await?;

    let blocked = match relationship::find_between_for_update(&txn, blocker_id, target_id).await? {
        None => relationship::create(&txn, blocker_id, target_id, RelationshipStatus::Blocked).await?,
        Some(existing) if existing.status == RelationshipStatus::Blocked => {
            return Err(if existing.is_blocked_by(blocker_id) {
                Error::rejected(RejectedKind::AlreadyExists, "user is already blocked")
            } else {
                Error::rejected(
                    RejectedKind::Forbidden,
                    "the other user has blocked this relationship",
                )
            });
        }
        Some(existing) if existing.requester_id == blocker_id => {
            let current = existing.status;
            relationship::transition_status(&txn, existing, current, RelationshipStatus::Blocked).await?
        }
        Some(existing) => {
            relationship::delete_with_status(&txn, existing.id, existing.status).await?;
            relationship::create(&txn, blocker_id, target_id, RelationshipStatus::Blocked).await?
        }
    };

    txn.commit().await?;

    info!("User {blocker_id} blocked {target_id}");

    Ok(blocked)
}

/// Lifts a block. Only the identity that created the block may do this; the
/// pair is left with no relationship.
pub async fn unblock(db: &DatabaseConnection, blocker_id: &str, target_id: &str) -> Result<(), Error> {
    validate_pair(blocker_id, target_id)?;
    forbid_assistant(blocker_id, target_id, "the assistant cannot be unblocked")?;

    let txn = db.begin().await?;

    let existing = relationship::find_between_for_update(&txn, blocker_id, target_id)
        .await?
        .ok_or_else(|| Error::rejected(RejectedKind::NotFound, "relationship not found"))?;

    if existing.status != RelationshipStatus::Blocked {
        return Err(Error::rejected(RejectedKind::NotBlocked, "user is not blocked"));
    }

    if !existing.is_blocked_by(blocker_id) {
        warn!("User {blocker_id} tried to lift a block created by {}", existing.requester_id);
        return Err(Error::rejected(
            RejectedKind::Forbidden,
            "only the user who blocked can unblock",
        ));
    }

    relationship::delete_with_status(&txn, existing.id, RelationshipStatus::Blocked).await?;
    txn.commit().await?;

    info!("User {blocker_id} unblocked {target_id}");

    Ok(())
}

/// Deletes a pending, accepted or rejected relationship. Blocked rows are not
/// removable this way.
pub async fn remove(db: &DatabaseConnection, user_id: &str, other_id: &str) -> Result<(), Error> {
    validate_pair(user_id, other_id)?;
    forbid_assistant(user_id, other_id, "the assistant relationship cannot be removed")?;

    let txn = db.begin().await?;

    let existing = relationship::find_between_for_update(&txn, user_id, other_id)
        .await?
        .filter(|existing| existing.status != RelationshipStatus::Blocked)
        .ok_or_else(|| Error::rejected(RejectedKind::NotFound, "relationship not found"))?;

    // A block that lands between the read and the delete leaves the row alone
    relationship::delete_with_status(&txn, existing.id, existing.status)
        .await
        .map_err(|e| {
            if e.error_kind == EntityApiErrorKind::RecordNotFound {
                Error::rejected(RejectedKind::NotFound, "relationship not found")
            } else {
                e.into()
            }
        })?;
    txn.commit().await?;

    info!("Relationship between {user_id} and {other_id} removed by {user_id}");

    Ok(())
}

/// Current status between two identities, if they have a relationship.
pub async fn query(db: &DatabaseConnection, a_id: &str, b_id: &str) -> Result<Option<RelationshipStatus>, Error> {
    Ok(relationship::find_between(db, a_id, b_id)
        .await?
        .map(|existing| existing.status))
}

/// True only when `observer_id` has blocked `subject_id`.
pub async fn is_blocked_by(db: &DatabaseConnection, observer_id: &str, subject_id: &str) -> Result<bool, Error> {
    Ok(relationship::find_between(db, observer_id, subject_id)
        .await?
        .is_some_and(|existing| existing.is_blocked_by(observer_id)))
}

pub async fn find_by_participant(
    db: &DatabaseConnection,
    user_id: &str,
    status: Option<RelationshipStatus>,
) -> Result<Vec<Model>, Error> {
    Ok(relationship::find_by_participant(db, user_id, status).await?)
}

/// Identities holding an accepted relationship with `user_id`.
pub async fn find_friends(db: &DatabaseConnection, user_id: &str) -> Result<Vec<crate::UserId>, Error> {
    Ok(relationship::find_accepted_counterparts(db, user_id).await?)
}

/// Makes sure `user_id` is friends with the assistant. Safe to call any number
/// of times; called once when a realtime session starts.
pub async fn ensure_assistant_relationship(db: &DatabaseConnection, user_id: &str) -> Result<Model, Error> {
    if user_id.is_empty() || users::is_assistant(user_id) {
        return Err(Error::rejected(
            RejectedKind::InvalidRequest,
            "not a valid assistant counterpart",
        ));
    }

    if let Some(existing) = relationship::find_between(db, users::ASSISTANT_ID, user_id).await? {
        return Ok(existing);
    }

    match relationship::create(db, users::ASSISTANT_ID, user_id, RelationshipStatus::Accepted).await {
        Ok(created) => {
            debug!("Created assistant relationship for {user_id}");
            Ok(created)
        }
        // Another session of the same user got there first
        Err(e) if e.error_kind == EntityApiErrorKind::RecordAlreadyExists => {
            relationship::find_between(db, users::ASSISTANT_ID, user_id)
                .await?
                .ok_or_else(|| Error::from(e))
        }
        Err(e) => Err(e.into()),
    }
}

fn validate_pair(a: &str, b: &str) -> Result<(), Error> {
    if a.is_empty() || b.is_empty() {
        return Err(Error::rejected(RejectedKind::InvalidRequest, "user id is required"));
    }
    if a == b {
        return Err(Error::rejected(
            RejectedKind::InvalidRequest,
            "a relationship needs two different users",
        ));
    }
    Ok(())
}

fn forbid_assistant(a: &str, b: &str, reason: &str) -> Result<(), Error> {
    if users::is_assistant(a) || users::is_assistant(b) {
        warn!("Rejected assistant relationship change between {a} and {b}");
        return Err(Error::rejected(RejectedKind::Forbidden, reason));
    }
    Ok(())
}

async fn require_user(db: &DatabaseConnection, user_id: &str) -> Result<(), Error> {
    if !user::exists(db, user_id).await? {
        return Err(Error::rejected(RejectedKind::NotFound, "user not found"));
    }
    Ok(())
}

fn already_exists() -> Error {
    Error::rejected(RejectedKind::AlreadyExists, "a relationship already exists")
}

fn no_pending_request() -> Error {
    Error::rejected(RejectedKind::NotFound, "no pending request")
}

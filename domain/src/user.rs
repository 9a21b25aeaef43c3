use crate::error::{Error, InternalErrorKind, RejectedKind};
use crate::users::{self, Model};
use entity_api::{message, relationship, user};
use log::*;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

pub async fn exists(db: &DatabaseConnection, user_id: &str) -> Result<bool, Error> {
    Ok(user::exists(db, user_id).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, user_id: &str) -> Result<Model, Error> {
    Ok(user::find_by_id(db, user_id).await?)
}

/// What a completed deletion removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeletionReport {
    pub messages_deleted: u64,
    pub relationships_deleted: u64,
}

/// Deletes a user and everything that references it, in order: messages,
/// relationships, then the user row.
///
/// Each step is safe to repeat. If a step fails the error lists the steps that
/// already completed; nothing is rolled back, so calling again finishes the job.
pub async fn delete(db: &DatabaseConnection, user_id: &str) -> Result<DeletionReport, Error> {
    if users::is_assistant(user_id) {
        return Err(Error::rejected(
            RejectedKind::Forbidden,
            "the assistant cannot be deleted",
        ));
    }
    if !user::exists(db, user_id).await? {
        return Err(Error::rejected(RejectedKind::NotFound, "user not found"));
    }

    let mut completed_steps = Vec::new();

    let messages_deleted = message::delete_by_participant(db, user_id)
        .await
        .map_err(|e| partial_failure(user_id, e, &completed_steps))?;
    completed_steps.push(format!("deleted {messages_deleted} message(s)"));

    let relationships_deleted = relationship::delete_by_participant(db, user_id)
        .await
        .map_err(|e| partial_failure(user_id, e, &completed_steps))?;
    completed_steps.push(format!("deleted {relationships_deleted} relationship(s)"));

    user::delete_by_id(db, user_id)
        .await
        .map_err(|e| partial_failure(user_id, e, &completed_steps))?;

    info!(
        "Deleted user {user_id} with {messages_deleted} message(s) and {relationships_deleted} relationship(s)"
    );

    Ok(DeletionReport {
        messages_deleted,
        relationships_deleted,
    })
}

fn partial_failure(user_id: &str, source: entity_api::error::Error, completed_steps: &[String]) -> Error {
    error!("Deleting user {user_id} stopped after {completed_steps:?}: {source}");
    Error::internal(
        source,
        InternalErrorKind::PartialFailure {
            completed_steps: completed_steps.to_vec(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::events::EventPublisher;
    use crate::message::{self as messaging, NewMessage};
    use crate::message_type::MessageType;
    use crate::relationship as relationships;
    use crate::test_utils::{befriend, setup_with_users};

    #[tokio::test]
    async fn delete_removes_messages_relationships_and_user() -> Result<(), Error> {
        let db = setup_with_users().await;
        befriend(&db, "alice", "bob").await;
        relationships::block(&db, "carol", "alice").await?;
        messaging::send(
            &db,
            &EventPublisher::default(),
            NewMessage {
                sender_id: "alice".to_string(),
                receiver_id: "bob".to_string(),
                content: "bye".to_string(),
                message_type: MessageType::Text,
                attachment: None,
            },
        )
        .await?;

        let report = delete(&db, "alice").await?;

        assert_eq!(
            report,
            DeletionReport {
                messages_deleted: 1,
                relationships_deleted: 2
            }
        );
        assert!(!exists(&db, "alice").await?);
        assert!(relationships::find_by_participant(&db, "bob", None).await?.is_empty());
        assert!(exists(&db, "bob").await?);

        Ok(())
    }

    #[tokio::test]
    async fn delete_unknown_or_assistant_is_rejected() -> Result<(), Error> {
        let db = setup_with_users().await;

        assert_eq!(delete(&db, "zed").await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            delete(&db, users::ASSISTANT_ID).await.unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        assert!(exists(&db, users::ASSISTANT_ID).await?);

        Ok(())
    }
}

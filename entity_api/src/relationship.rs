use super::error::{EntityApiErrorKind, Error};
use chrono::Utc;
use entity::relationship_status::RelationshipStatus;
use entity::relationships::{pair_key, ActiveModel, Column, Entity, Model};
use entity::{Id, UserId};
use log::*;
use sea_orm::{
    entity::prelude::*, sea_query::Expr, Condition, ConnectionTrait,
    QueryOrder, QuerySelect, Set,
};

/// Inserts a new relationship row for the pair. The unique `pair_key` makes a
/// second insert for the same unordered pair fail with `RecordAlreadyExists`.
pub async fn create(
    db: &impl ConnectionTrait,
    requester_id: &str,
    recipient_id: &str,
    status: RelationshipStatus,
) -> Result<Model, Error> {
    debug!("New Relationship {requester_id} -> {recipient_id} ({status}) to be inserted");

    let now = Utc::now();
    let accepted_at = match status {
        RelationshipStatus::Accepted => Some(now.into()),
        _ => None,
    };

    let relationship_active_model = ActiveModel {
        id: Set(Id::new_v4()),
        requester_id: Set(requester_id.to_owned()),
        recipient_id: Set(recipient_id.to_owned()),
        pair_key: Set(pair_key(requester_id, recipient_id)),
        status: Set(status),
        requested_at: Set(now.into()),
        accepted_at: Set(accepted_at),
    };

    Ok(relationship_active_model.insert(db).await?)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Finds the relationship between two identities regardless of who created it.
pub async fn find_between(
    db: &impl ConnectionTrait,
    a: &str,
    b: &str,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::PairKey.eq(pair_key(a, b)))
        .one(db)
        .await?)
}

/// Like [`find_between`], but locks the row until the surrounding transaction
/// ends so that concurrent changes to the same pair queue behind it. SQLite has
/// no row locks; there the transaction itself serializes writers.
pub async fn find_between_for_update(
    db: &impl ConnectionTrait,
    a: &str,
    b: &str,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::PairKey.eq(pair_key(a, b)))
        .lock_exclusive()
        .one(db)
        .await?)
}

/// All relationships `user_id` takes part in, newest first.
pub async fn find_by_participant(
    db: &impl ConnectionTrait,
    user_id: &str,
    status: Option<RelationshipStatus>,
) -> Result<Vec<Model>, Error> {
    let mut query = Entity::find().filter(
        Condition::any()
            .add(Column::RequesterId.eq(user_id))
            .add(Column::RecipientId.eq(user_id)),
    );

    if let Some(status) = status {
        query = query.filter(Column::Status.eq(status));
    }

    Ok(query.order_by_desc(Column::RequestedAt).all(db).await?)
}

/// Ids of every identity holding an accepted relationship with `user_id`.
pub async fn find_accepted_counterparts(
    db: &impl ConnectionTrait,
    user_id: &str,
) -> Result<Vec<UserId>, Error> {
    let relationships =
        find_by_participant(db, user_id, Some(RelationshipStatus::Accepted)).await?;

    Ok(relationships
        .iter()
        .map(|relationship| relationship.counterpart_of(user_id).to_owned())
        .collect())
}

/// Moves the relationship to `status` only if it is still in `expected`.
/// Fails with `RecordNotUpdated` when another caller changed it first.
pub async fn transition_status(
    db: &impl ConnectionTrait,
    relationship: Model,
    expected: RelationshipStatus,
    status: RelationshipStatus,
) -> Result<Model, Error> {
    let accepted_at: Option<DateTimeWithTimeZone> = match status {
        RelationshipStatus::Accepted => Some(Utc::now().into()),
        _ => None,
    };

    let result = Entity::update_many()
        .col_expr(Column::Status, Expr::value(status.clone()))
        .col_expr(Column::AcceptedAt, Expr::value(accepted_at))
        .filter(Column::Id.eq(relationship.id))
        .filter(Column::Status.eq(expected))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error {
            source: None,
            error_kind: EntityApiErrorKind::RecordNotUpdated,
        });
    }

    Ok(Model {
        status,
        accepted_at,
        ..relationship
    })
}

/// Deletes the row only while it is still in `expected` status. Fails with
/// `RecordNotFound` when it is gone or has moved to another status.
pub async fn delete_with_status(
    db: &impl ConnectionTrait,
    id: Id,
    expected: RelationshipStatus,
) -> Result<(), Error> {
    let result = Entity::delete_many()
        .filter(Column::Id.eq(id))
        .filter(Column::Status.eq(expected))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::not_found());
    }
    Ok(())
}

/// Removes every relationship `user_id` takes part in, returning how many rows went away.
pub async fn delete_by_participant(db: &impl ConnectionTrait, user_id: &str) -> Result<u64, Error> {
    let result = Entity::delete_many()
        .filter(
            Condition::any()
                .add(Column::RequesterId.eq(user_id))
                .add(Column::RecipientId.eq(user_id)),
        )
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

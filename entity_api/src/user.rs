use super::error::Error;
use chrono::Utc;
use entity::users::{ActiveModel, Entity, Model};
use log::*;
use sea_orm::{entity::prelude::*, ConnectionTrait, PaginatorTrait, Set};

pub async fn create(
    db: &impl ConnectionTrait,
    id: &str,
    display_name: &str,
) -> Result<Model, Error> {
    debug!("New User to be inserted: {id}");

    let user_active_model = ActiveModel {
        id: Set(id.to_owned()),
        display_name: Set(display_name.to_owned()),
        created_at: Set(Utc::now().into()),
    };

    Ok(user_active_model.insert(db).await?)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: &str) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

pub async fn exists(db: &impl ConnectionTrait, id: &str) -> Result<bool, Error> {
    Ok(Entity::find_by_id(id).count(db).await? > 0)
}

/// Deletes the identity row only. Callers remove dependent rows first.
pub async fn delete_by_id(db: &impl ConnectionTrait, id: &str) -> Result<(), Error> {
    let result = Entity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityApiErrorKind;
    use crate::test_utils::setup;

    #[tokio::test]
    async fn create_then_find_by_id_returns_the_user() -> Result<(), Error> {
        let db = setup().await;

        create(&db, "alice", "Alice").await?;
        let user = find_by_id(&db, "alice").await?;

        assert_eq!(user.display_name, "Alice");
        assert!(exists(&db, "alice").await?);
        assert!(!exists(&db, "alice2").await?);

        Ok(())
    }

    #[tokio::test]
    async fn create_duplicate_id_reports_already_exists() -> Result<(), Error> {
        let db = setup().await;

        create(&db, "alice", "Alice").await?;
        let result = create(&db, "alice", "Other Alice").await;

        assert_eq!(
            result.unwrap_err().error_kind,
            EntityApiErrorKind::RecordAlreadyExists
        );

        Ok(())
    }

    #[tokio::test]
    async fn delete_by_id_returns_not_found_for_unknown_user() -> Result<(), Error> {
        let db = setup().await;

        let result = delete_by_id(&db, "nobody").await;

        assert_eq!(
            result.unwrap_err().error_kind,
            EntityApiErrorKind::RecordNotFound
        );

        Ok(())
    }
}

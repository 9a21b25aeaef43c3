use chrono::Utc;
use entity::users::{self, ASSISTANT_ID};
use log::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ActiveModelTrait, EntityTrait, Set};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        if users::Entity::find_by_id(ASSISTANT_ID).one(db).await?.is_some() {
            debug!("Assistant user already present, skipping insert");
            return Ok(());
        }

        users::ActiveModel {
            id: Set(ASSISTANT_ID.to_owned()),
            display_name: Set("Assistant".to_owned()),
            created_at: Set(Utc::now().into()),
        }
        .insert(db)
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        users::Entity::delete_by_id(ASSISTANT_ID)
            .exec(manager.get_connection())
            .await?;

        Ok(())
    }
}

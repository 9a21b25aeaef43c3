pub use sea_orm_migration::prelude::*;

mod m20260105_000001_create_users_relationships_messages;
mod m20260105_000002_add_assistant_user;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260105_000001_create_users_relationships_messages::Migration),
            Box::new(m20260105_000002_add_assistant_user::Migration),
        ]
    }
}

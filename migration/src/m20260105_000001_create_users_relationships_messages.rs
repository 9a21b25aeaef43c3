use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .string_len(128)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::DisplayName).string().not_null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Relationships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Relationships::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Relationships::RequesterId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Relationships::RecipientId)
                            .string_len(128)
                            .not_null(),
                    )
                    // One row per unordered pair, whichever side created it
                    .col(
                        ColumnDef::new(Relationships::PairKey)
                            .string_len(257)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Relationships::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Relationships::RequestedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Relationships::AcceptedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_relationships_requester_id")
                            .from(Relationships::Table, Relationships::RequesterId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_relationships_recipient_id")
                            .from(Relationships::Table, Relationships::RecipientId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_relationships_requester_id")
                    .table(Relationships::Table)
                    .col(Relationships::RequesterId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_relationships_recipient_id")
                    .table(Relationships::Table)
                    .col(Relationships::RecipientId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Messages::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Messages::SenderId).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Messages::ReceiverId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Messages::Content).text().not_null())
                    .col(
                        ColumnDef::new(Messages::SentAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Messages::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Messages::MessageType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Messages::AttachmentUrl).text())
                    .col(ColumnDef::new(Messages::AttachmentName).string())
                    .col(ColumnDef::new(Messages::AttachmentSizeBytes).big_integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_messages_sender_id")
                            .from(Messages::Table, Messages::SenderId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_messages_receiver_id")
                            .from(Messages::Table, Messages::ReceiverId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Serves conversation history in both directions
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_sender_receiver_sent_at")
                    .table(Messages::Table)
                    .col(Messages::SenderId)
                    .col(Messages::ReceiverId)
                    .col(Messages::SentAt)
                    .to_owned(),
            )
            .await?;

        // Serves unread counts and mark-as-read
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_receiver_is_read")
                    .table(Messages::Table)
                    .col(Messages::ReceiverId)
                    .col(Messages::IsRead)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Messages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Relationships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    DisplayName,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Relationships {
    Table,
    Id,
    RequesterId,
    RecipientId,
    PairKey,
    Status,
    RequestedAt,
    AcceptedAt,
}

#[derive(DeriveIden)]
enum Messages {
    Table,
    Id,
    SenderId,
    ReceiverId,
    Content,
    SentAt,
    IsRead,
    MessageType,
    AttachmentUrl,
    AttachmentName,
    AttachmentSizeBytes,
}

//! Initial schema: users, teams and the users_teams junction table

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============================================================
        // 1. Create users table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string_len(Users::Login, 10).not_null().unique_key())
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 2. Create teams table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Teams::Table)
                    .if_not_exists()
                    .col(pk_auto(Teams::Id))
                    .col(string_len(Teams::Name, 10).not_null())
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 3. Create users_teams junction table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(UsersTeams::Table)
                    .if_not_exists()
                    .col(integer(UsersTeams::UserId).not_null())
                    .col(integer(UsersTeams::TeamId).not_null())
                    .primary_key(
                        Index::create()
                            .col(UsersTeams::UserId)
                            .col(UsersTeams::TeamId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_teams_user_id")
                            .from(UsersTeams::Table, UsersTeams::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_teams_team_id")
                            .from(UsersTeams::Table, UsersTeams::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Membership lookups go by team as well as by user
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_teams_team_id")
                    .table(UsersTeams::Table)
                    .col(UsersTeams::TeamId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsersTeams::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Teams::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Login,
}

#[derive(DeriveIden)]
enum Teams {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum UsersTeams {
    #[sea_orm(iden = "users_teams")]
    Table,
    UserId,
    TeamId,
}

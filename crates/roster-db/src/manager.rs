//! Data-access manager for users, teams and memberships
//!
//! Single-row operations log store failures and degrade to `false`, an empty
//! list or an unset id. Only [`DbManager::set_teams_for_user`] returns an
//! error, and it leaves no partial memberships behind when it does.

use crate::config::{ConnectionConfig, DEFAULT_PROPERTIES_FILE};
use crate::entities::{team, user, user_team};
use crate::error::DbError;
use crate::model::{Team, User};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, TransactionTrait,
};
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

static GLOBAL: OnceCell<DbManager> = OnceCell::const_new();

/// CRUD and membership operations over a relational store
///
/// Cloning is cheap; clones share the underlying connection pool. The manager
/// caches nothing, so entities passed in are never retained past the call.
#[derive(Clone, Debug)]
pub struct DbManager {
    db: DatabaseConnection,
}

impl DbManager {
    /// Wrap an established connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Read `connection.url` from a properties file and connect.
    ///
    /// The file is read on every call.
    pub async fn from_properties(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let config = ConnectionConfig::load(path)
            .map_err(|e| DbError::with_source("Failed to load connection configuration", e))?;
        let db = crate::connect(&config.url)
            .await
            .map_err(|e| DbError::with_source("Failed to connect to database", e))?;

        Ok(Self::new(db))
    }

    /// Process-wide manager built from [`DEFAULT_PROPERTIES_FILE`].
    ///
    /// Initialised at most once, even when first called concurrently. A
    /// failed initialisation is not cached and the next call retries.
    pub async fn global() -> Result<&'static DbManager, DbError> {
        GLOBAL
            .get_or_try_init(|| Self::from_properties(DEFAULT_PROPERTIES_FILE))
            .await
    }

    /// Underlying connection, for migrations and ad-hoc queries
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// All users, in store order
    pub async fn find_all_users(&self) -> Vec<User> {
        match user::Entity::find().all(&self.db).await {
            Ok(rows) => rows.into_iter().map(User::from).collect(),
            Err(e) => {
                error!("Failed to list users: {}", e);
                Vec::new()
            }
        }
    }

    /// All teams, in store order
    pub async fn find_all_teams(&self) -> Vec<Team> {
        match team::Entity::find().all(&self.db).await {
            Ok(rows) => rows.into_iter().map(Team::from).collect(),
            Err(e) => {
                error!("Failed to list teams: {}", e);
                Vec::new()
            }
        }
    }

    /// Insert a user and set its id from the generated key
    pub async fn insert_user(&self, user: &mut User) -> bool {
        let row = user::ActiveModel {
            login: Set(user.login().to_string()),
            ..Default::default()
        };

        match user::Entity::insert(row).exec(&self.db).await {
            Ok(inserted) => {
                user.set_id(inserted.last_insert_id);
                debug!("Inserted user {} with id {}", user, user.id());
                true
            }
            Err(e) => {
                error!("Failed to insert user {}: {}", user, e);
                false
            }
        }
    }

    /// Insert a team and set its id from the generated key
    pub async fn insert_team(&self, team: &mut Team) -> bool {
        let row = team::ActiveModel {
            name: Set(team.name().to_string()),
            ..Default::default()
        };

        match team::Entity::insert(row).exec(&self.db).await {
            Ok(inserted) => {
                team.set_id(inserted.last_insert_id);
                debug!("Inserted team {} with id {}", team, team.id());
                true
            }
            Err(e) => {
                error!("Failed to insert team {}: {}", team, e);
                false
            }
        }
    }

    /// Delete users one at a time, in order.
    ///
    /// An absent entry stops the call with `false`. Every delete commits on
    /// its own, so users removed before the stop stay removed.
    pub async fn delete_users<'a, I>(&self, users: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<Option<&'a User>>,
    {
        for (position, entry) in users.into_iter().enumerate() {
            let entry: Option<&User> = entry.into();
            let Some(user) = entry else {
                warn!("User at position {} is absent, aborting delete", position);
                return false;
            };

            if let Err(e) = user::Entity::delete_by_id(user.id()).exec(&self.db).await {
                error!("Failed to delete user {}: {}", user, e);
                return false;
            }
            debug!("Deleted user {}", user);
        }

        true
    }

    /// Delete a team; its memberships go with it
    pub async fn delete_team(&self, team: &Team) -> bool {
        match team::Entity::delete_by_id(team.id()).exec(&self.db).await {
            Ok(result) => {
                debug!("Deleted team {} ({} rows)", team, result.rows_affected);
                true
            }
            Err(e) => {
                error!("Failed to delete team {}: {}", team, e);
                false
            }
        }
    }

    /// Look a user up by login.
    ///
    /// A miss returns a fresh user with an unset id; check
    /// [`User::is_persisted`].
    pub async fn get_user(&self, login: &str) -> User {
        let mut found = User::new(login);

        match user::Entity::find()
            .filter(user::Column::Login.eq(login))
            .one(&self.db)
            .await
        {
            Ok(Some(row)) => found.set_id(row.id),
            Ok(None) => debug!("No user with login {}", login),
            Err(e) => error!("Failed to look up user {}: {}", login, e),
        }

        found
    }

    /// Look a team up by name.
    ///
    /// A miss returns a fresh team with an unset id; check
    /// [`Team::is_persisted`].
    pub async fn get_team(&self, name: &str) -> Team {
        let mut found = Team::new(name);

        match team::Entity::find()
            .filter(team::Column::Name.eq(name))
            .one(&self.db)
            .await
        {
            Ok(Some(row)) => found.set_id(row.id),
            Ok(None) => debug!("No team named {}", name),
            Err(e) => error!("Failed to look up team {}: {}", name, e),
        }

        found
    }

    /// Add memberships for `user` in every team, all or nothing.
    ///
    /// Runs in one transaction. An absent team or a failed insert (for
    /// instance a pair that already exists) rolls back every membership added
    /// by this call and returns the error. Existing memberships are kept.
    pub async fn set_teams_for_user<'a, I>(&self, user: &User, teams: I) -> Result<(), DbError>
    where
        I: IntoIterator,
        I::Item: Into<Option<&'a Team>>,
    {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| DbError::with_source("Failed to begin transaction", e))?;

        for (position, entry) in teams.into_iter().enumerate() {
            let entry: Option<&Team> = entry.into();
            let Some(team) = entry else {
                rollback(txn).await;
                return Err(DbError::new(format!(
                    "Team at position {} is absent",
                    position
                )));
            };

            let membership = user_team::ActiveModel {
                user_id: Set(user.id()),
                team_id: Set(team.id()),
            };

            if let Err(e) = user_team::Entity::insert(membership)
                .exec_without_returning(&txn)
                .await
            {
                rollback(txn).await;
                return Err(DbError::with_source(
                    format!("Failed to add user {} to team {}", user, team),
                    e,
                ));
            }
        }

        txn.commit()
            .await
            .map_err(|e| DbError::with_source("Failed to commit team assignment", e))?;

        info!("Updated team memberships for user {}", user);
        Ok(())
    }

    /// Teams the user belongs to, in membership order.
    ///
    /// Each membership costs one extra lookup. A failed lookup ends the list
    /// early with what was resolved so far.
    pub async fn get_user_teams(&self, user: &User) -> Vec<Team> {
        let memberships = match user_team::Entity::find()
            .filter(user_team::Column::UserId.eq(user.id()))
            .all(&self.db)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to list memberships of user {}: {}", user, e);
                return Vec::new();
            }
        };

        let mut teams = Vec::with_capacity(memberships.len());
        for membership in memberships {
            match team::Entity::find_by_id(membership.team_id)
                .one(&self.db)
                .await
            {
                Ok(Some(row)) => teams.push(Team::from(row)),
                // Deleted between the two queries
                Ok(None) => debug!("Team {} no longer exists", membership.team_id),
                Err(e) => {
                    error!("Failed to load team {}: {}", membership.team_id, e);
                    break;
                }
            }
        }

        teams
    }

    /// Persist a team's current name
    pub async fn update_team(&self, team: &Team) -> bool {
        let changes = team::ActiveModel {
            name: Set(team.name().to_string()),
            ..Default::default()
        };

        match team::Entity::update_many()
            .set(changes)
            .filter(team::Column::Id.eq(team.id()))
            .exec(&self.db)
            .await
        {
            Ok(result) => {
                debug!(
                    "Renamed team {} to {} ({} rows)",
                    team.id(),
                    team,
                    result.rows_affected
                );
                true
            }
            Err(e) => {
                error!("Failed to update team {}: {}", team, e);
                false
            }
        }
    }
}

async fn rollback(txn: DatabaseTransaction) {
    if let Err(e) = txn.rollback().await {
        error!("Failed to roll back transaction: {}", e);
    }
}

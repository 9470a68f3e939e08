//! User and team value types handed to callers
//!
//! Both compare and hash by their natural key (login / name). The surrogate
//! id is `0` until the row has been inserted.

use crate::entities::{team, user};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Id carried by an entity that has not been stored yet
pub const UNSET_ID: i32 = 0;

/// A user, identified by login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: i32,
    login: String,
}

impl User {
    /// Create a user that has not been stored yet
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            id: UNSET_ID,
            login: login.into(),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn set_login(&mut self, login: impl Into<String>) {
        self.login = login.into();
    }

    /// Whether the id was assigned by the store
    pub fn is_persisted(&self) -> bool {
        self.id != UNSET_ID
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.login == other.login
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.login.hash(state);
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.login)
    }
}

impl From<user::Model> for User {
    fn from(row: user::Model) -> Self {
        Self {
            id: row.id,
            login: row.login,
        }
    }
}

/// A team, identified by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    id: i32,
    name: String,
}

impl Team {
    /// Create a team that has not been stored yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UNSET_ID,
            name: name.into(),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename in memory; persist with [`DbManager::update_team`](crate::DbManager::update_team)
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Whether the id was assigned by the store
    pub fn is_persisted(&self) -> bool {
        self.id != UNSET_ID
    }
}

impl PartialEq for Team {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Team {}

impl Hash for Team {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<team::Model> for Team {
    fn from(row: team::Model) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

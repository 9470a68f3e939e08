//! User row

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Store-generated identity
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Login (unique)
    #[sea_orm(unique)]
    pub login: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// User is a member of teams
    #[sea_orm(has_many = "super::user_team::Entity")]
    Memberships,
}

impl Related<super::user_team::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

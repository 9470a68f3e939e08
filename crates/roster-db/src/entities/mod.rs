//! Database entities

pub mod team;
pub mod user;
pub mod user_team;

//! Error type raised by the data-access layer

use sea_orm::DbErr;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure raised by [`DbManager`](crate::DbManager).
///
/// There is a single error kind: an optional human-readable message plus an
/// optional underlying cause. An absent team in a batch and a constraint
/// violation during the batch both produce this type; inspect
/// [`DbError::cause`] to tell them apart. Configuration failures carry the
/// [`ConfigError`](crate::ConfigError) as their source.
#[derive(Error, Debug)]
#[error("{}", describe(.message, .source))]
pub struct DbError {
    message: Option<String>,
    #[source]
    source: Option<BoxError>,
}

impl DbError {
    /// Error carrying only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            source: None,
        }
    }

    /// Error carrying a message and the error that caused it
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: Some(message.into()),
            source: Some(Box::new(source)),
        }
    }

    /// Human-readable message, if one was given
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Underlying database error, if the cause was one
    pub fn cause(&self) -> Option<&DbErr> {
        self.source.as_deref()?.downcast_ref::<DbErr>()
    }
}

impl From<DbErr> for DbError {
    fn from(source: DbErr) -> Self {
        Self {
            message: None,
            source: Some(Box::new(source)),
        }
    }
}

fn describe(message: &Option<String>, source: &Option<BoxError>) -> String {
    match (message, source) {
        (Some(message), Some(source)) => format!("{}: {}", message, source),
        (Some(message), None) => message.clone(),
        (None, Some(source)) => format!("Database error: {}", source),
        (None, None) => "Database error".to_string(),
    }
}

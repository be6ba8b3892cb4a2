use anyhow::{Context, Result};
use sqlx::MySqlPool;
use sqlx::error::ErrorKind;
use sqlx::mysql::MySqlPoolOptions;
use std::time::Duration;

pub async fn init_db(database_url: &str, run_migrations: bool) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    if run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        tracing::info!("Migrations applied");
    }

    Ok(pool)
}

/// Integrity failures a handler can explain to the client.
///
/// MySQL reports all of these as SQLSTATE 23000, so the driver's error
/// kind (derived from the MySQL error number) is used instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Unique,
    ForeignKey,
    NotNull,
}

pub fn violation(err: &sqlx::Error) -> Option<Violation> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };

    match db_err.kind() {
        ErrorKind::UniqueViolation => Some(Violation::Unique),
        ErrorKind::ForeignKeyViolation => Some(Violation::ForeignKey),
        ErrorKind::NotNullViolation => Some(Violation::NotNull),
        _ => None,
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    violation(err) == Some(Violation::Unique)
}

/// Stand-in for a driver error, for handler mapping tests.
#[cfg(test)]
pub mod test_errors {
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::error::Error as StdError;

    #[derive(Debug, Clone, Copy)]
    pub enum Kind {
        Unique,
        ForeignKey,
        NotNull,
        Other,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("integrity error: {kind:?}")]
    pub struct FakeDbError {
        kind: Kind,
    }

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "integrity error"
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.kind {
                Kind::Unique => ErrorKind::UniqueViolation,
                Kind::ForeignKey => ErrorKind::ForeignKeyViolation,
                Kind::NotNull => ErrorKind::NotNullViolation,
                Kind::Other => ErrorKind::Other,
            }
        }
    }

    pub fn db_error(kind: Kind) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError { kind }))
    }
}

#[cfg(test)]
mod tests {
    use super::test_errors::{Kind, db_error};
    use super::*;

    #[test]
    fn integrity_errors_are_told_apart() {
        assert_eq!(violation(&db_error(Kind::Unique)), Some(Violation::Unique));
        assert_eq!(violation(&db_error(Kind::ForeignKey)), Some(Violation::ForeignKey));
        assert_eq!(violation(&db_error(Kind::NotNull)), Some(Violation::NotNull));
        assert_eq!(violation(&db_error(Kind::Other)), None);
        assert_eq!(violation(&sqlx::Error::RowNotFound), None);

        assert!(is_unique_violation(&db_error(Kind::Unique)));
        assert!(!is_unique_violation(&db_error(Kind::ForeignKey)));
    }

    #[test]
    fn schema_allows_one_open_shift_per_cleaner() {
        let schema = include_str!("../migrations/20260101000000_init.sql");
        assert!(schema.contains("open_cleaner_id BIGINT UNSIGNED AS (IF(clock_out IS NULL, cleaner_id, NULL)) STORED"));
        assert!(schema.contains("UNIQUE KEY uq_attendance_one_open (open_cleaner_id)"));
    }
}

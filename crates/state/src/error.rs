use canopy_core::error::CoreError;
use canopy_core::tree::TreeError;

/// Error type for state service operations.
///
/// Storage errors are categorized on the way in: unique violations become
/// [`CoreError::Conflict`], everything else is carried as
/// [`StateError::Database`] for the caller to log.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StateResult<T> = Result<T, StateError>;

impl From<sqlx::Error> for StateError {
    fn from(err: sqlx::Error) -> Self {
        if canopy_db::is_unique_violation(&err) {
            let constraint = match &err {
                sqlx::Error::Database(db) => db.constraint().unwrap_or("unknown").to_string(),
                _ => "unknown".to_string(),
            };
            return StateError::Core(CoreError::Conflict(format!(
                "Duplicate value violates unique constraint: {constraint}"
            )));
        }
        StateError::Database(err)
    }
}

impl From<TreeError> for StateError {
    fn from(err: TreeError) -> Self {
        StateError::Core(err.into())
    }
}

impl StateError {
    /// Returns `true` for duplicate-key failures.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StateError::Core(CoreError::Conflict(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn tree_errors_become_broken_tree() {
        let err: StateError = TreeError::MissingSummit.into();
        assert_matches!(err, StateError::Core(CoreError::BrokenTree(_)));
    }

    #[test]
    fn row_not_found_stays_a_database_error() {
        let err: StateError = sqlx::Error::RowNotFound.into();
        assert_matches!(err, StateError::Database(_));
        assert!(!err.is_conflict());
    }
}

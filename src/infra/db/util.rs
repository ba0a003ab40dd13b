use crate::application::repos::RepoError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const QUERY_CANCELED: &str = "57014";

/// Classify a driver error by SQLSTATE.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let code = db.code().map(|code| code.into_owned()).unwrap_or_default();
            classify_sqlstate(&code, db.message(), db.constraint())
        }
        other => RepoError::from_persistence(other),
    }
}

fn classify_sqlstate(code: &str, message: &str, constraint: Option<&str>) -> RepoError {
    match code {
        UNIQUE_VIOLATION => RepoError::Duplicate {
            constraint: constraint.unwrap_or("unknown").to_string(),
        },
        FOREIGN_KEY_VIOLATION
        | INVALID_TEXT_REPRESENTATION
        | CHECK_VIOLATION
        | NUMERIC_VALUE_OUT_OF_RANGE => RepoError::InvalidInput {
            message: message.to_string(),
        },
        QUERY_CANCELED => RepoError::Timeout,
        c if c.starts_with("23") => RepoError::Integrity {
            message: message.to_string(),
        },
        _ => RepoError::from_persistence(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_overflow_is_caller_input() {
        let error = classify_sqlstate("22003", "numeric field overflow", None);
        assert!(matches!(error, RepoError::InvalidInput { .. }));
    }

    #[test]
    fn unique_violation_keeps_the_constraint_name() {
        let error = classify_sqlstate(
            "23505",
            "duplicate key",
            Some("component_categories_name_key"),
        );
        assert!(matches!(
            error,
            RepoError::Duplicate { ref constraint } if constraint == "component_categories_name_key"
        ));
    }

    #[test]
    fn other_integrity_codes_map_to_integrity() {
        let error = classify_sqlstate("23502", "null value", None);
        assert!(matches!(error, RepoError::Integrity { .. }));
    }
}

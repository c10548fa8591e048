use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("SQL Server error: {0}")]
    SqlServer(String),

    #[error("Salesforce error: {0}")]
    Salesforce(String),

    #[error("Bulk API error: {0}")]
    Bulk(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for MigrationError {
    fn from(err: polars::error::PolarsError) -> Self {
        MigrationError::Polars(err.to_string())
    }
}

impl From<oracle::Error> for MigrationError {
    fn from(err: oracle::Error) -> Self {
        MigrationError::Oracle(err.to_string())
    }
}

impl From<tiberius::error::Error> for MigrationError {
    fn from(err: tiberius::error::Error) -> Self {
        MigrationError::SqlServer(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_server_errors_convert() {
        let err: MigrationError = tiberius::error::Error::Protocol("unexpected token".into()).into();
        assert!(matches!(err, MigrationError::SqlServer(ref m) if m.contains("unexpected token")));
    }
}

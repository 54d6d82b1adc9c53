use thiserror::Error;

/// Error types shared by the report pipeline.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Export not ready: {0}")]
    ResourceNotReady(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Report store error: {0}")]
    Store(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Excel error: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type ReportResult<T> = Result<T, ReportError>;

impl From<sqlx::Error> for ReportError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ReportError::NotFound("report".to_string()),
            other => ReportError::Store(other.to_string()),
        }
    }
}

impl From<toml::de::Error> for ReportError {
    fn from(err: toml::de::Error) -> Self {
        ReportError::Config(err.to_string())
    }
}

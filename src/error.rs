use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Ineligible(String),

    #[error("{0}")]
    Conflict(String),

    #[error("select a workspace first")]
    NoWorkspace,

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Sheet(#[from] calamine::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to render document: {0}")]
    Render(String),

    #[error("failed to send email: {0}")]
    Mail(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    /// Wire-level error code used in the `error.code` field of a response.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "bad_params",
            AppError::NotFound(_) => "not_found",
            AppError::Ineligible(_) => "ineligible",
            AppError::Conflict(_) => "conflict",
            AppError::NoWorkspace => "no_workspace",
            AppError::Db(_) => "db_failed",
            AppError::Io(_) => "io_failed",
            AppError::Csv(_) | AppError::Sheet(_) => "sheet_failed",
            AppError::Json(_) => "db_failed",
            AppError::Render(_) => "render_failed",
            AppError::Mail(_) => "mail_failed",
        }
    }

    /// Text sent to the caller. Server-side failures get a fixed message per
    /// code; their detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Db(_) | AppError::Json(_) => "database operation failed".to_string(),
            AppError::Io(_) => "file operation failed".to_string(),
            AppError::Csv(_) | AppError::Sheet(_) => "could not read the spreadsheet".to_string(),
            AppError::Render(_) => "could not render the hall ticket".to_string(),
            AppError::Mail(_) => "could not send the email".to_string(),
            other => other.to_string(),
        }
    }

    /// Client errors are answered as-is; everything else is a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::NotFound(_)
                | AppError::Ineligible(_)
                | AppError::Conflict(_)
                | AppError::NoWorkspace
        )
    }
}

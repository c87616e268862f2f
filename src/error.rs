use thiserror::Error;

/// Errors raised by the grade form services.
///
/// Per-item failures (one release target, one CSV line) are collected by the
/// services into their outcome structs instead of being returned as `Err`.
#[derive(Error, Debug)]
pub enum GradeFormError {
    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    #[error("a filter is required when selecting all students")]
    MissingFilter,

    #[error("select at least one student")]
    NoStudentSelected,

    #[error("specify exactly one of release/unrelease")]
    NoActionSpecified,

    #[error("grade could not be saved: {0}")]
    GradeSaveFailed(String),

    #[error("line {line}: {reason}")]
    CsvRowInvalid { line: u64, reason: String },

    #[error("invalid CSV header: {0}")]
    CsvHeaderInvalid(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    BadParams(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl GradeFormError {
    pub fn code(&self) -> &'static str {
        match self {
            GradeFormError::UnknownFilter(_) => "unknown_filter",
            GradeFormError::MissingFilter => "missing_filter",
            GradeFormError::NoStudentSelected => "no_student_selected",
            GradeFormError::NoActionSpecified => "no_action_specified",
            GradeFormError::GradeSaveFailed(_) => "grade_save_failed",
            GradeFormError::CsvRowInvalid { .. } => "csv_row_invalid",
            GradeFormError::CsvHeaderInvalid(_) => "csv_header_invalid",
            GradeFormError::NotFound { .. } => "not_found",
            GradeFormError::BadParams(_) => "bad_params",
            GradeFormError::PersistenceFailure(_) => "persistence_failure",
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        GradeFormError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for GradeFormError {
    fn from(err: rusqlite::Error) -> Self {
        GradeFormError::PersistenceFailure(err.to_string())
    }
}

impl From<csv::Error> for GradeFormError {
    fn from(err: csv::Error) -> Self {
        GradeFormError::PersistenceFailure(format!("csv: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, GradeFormError>;

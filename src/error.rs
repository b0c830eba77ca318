use thiserror::Error;

/// Failure to turn an uploaded file into a [`crate::data::Dataset`].
///
/// Always recoverable: the session keeps whatever dataset it had before.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not decode input as {encoding}")]
    Decode { encoding: &'static str },
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),
    #[error("Invalid JSON data: {0}")]
    Json(String),
    #[error("Input has no header row")]
    Empty,
    #[error("Input must contain at least one data row")]
    NoRows,
    #[error("Row {row} has {found} fields, expected {expected}")]
    Ragged {
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// Failure raised while turning a parameter record into a figure.
///
/// Reported inline; the previously cached figure stays in place.
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Could not interpret value for name `{0}`: column not found in dataset")]
    MissingColumn(String),
    #[error("Column '{0}' is not numeric")]
    NotNumeric(String),
    #[error("Invalid value for `{key}`: {message}")]
    InvalidOption { key: String, message: String },
    #[error("Not enough data: {0}")]
    InsufficientData(String),
    #[error("{0}")]
    Render(String),
}

impl PlotError {
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        PlotError::InvalidOption {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Errors produced by the interactive command surface.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No dataset loaded (use `load <path>`)")]
    NoDataset,
    #[error("Unknown chart or family '{0}'")]
    UnknownChart(String),
    #[error("Chart '{chart}' has no widget named '{key}'")]
    UnknownWidget { chart: String, key: String },
    #[error("Value {value} is not allowed for '{key}': {reason}")]
    OutOfDomain {
        key: String,
        value: String,
        reason: String,
    },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("Error generating plot: {0}")]
    Plot(#[from] PlotError),
    #[error("Failed to write figure: {0}")]
    Io(#[from] std::io::Error),
}

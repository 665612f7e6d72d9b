use thiserror::Error;

/// Main error type for the calibration engine
#[derive(Error, Debug)]
pub enum PropcalError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Weight errors
    #[error("Invalid weight for {agent}: {value} (weights must be finite and > 0)")]
    InvalidWeight { agent: String, value: f64 },

    #[error("Invalid weight range for {agent}: min {min} > max {max}")]
    InvalidWeightRange { agent: String, min: f64, max: f64 },

    #[error("Search space is empty")]
    EmptySearchSpace,

    #[error("Weight store error: {0}")]
    Store(String),

    // Agent registry errors
    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    // History errors
    #[error("Actuals not loaded for period: {0}")]
    PeriodNotLoaded(String),

    #[error("History data not found: {0}")]
    HistoryNotFound(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Result type alias for PropcalError
pub type Result<T> = std::result::Result<T, PropcalError>;

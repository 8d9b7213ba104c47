use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipeSightError {
    #[error("Pipeline data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Analysis failed for {pipeline_key}: {reason}")]
    AnalysisFailed {
        pipeline_key: String,
        reason: String,
    },

    #[error("Analysis failed for all {count} pipelines (last error: {last_error})")]
    AllAnalysesFailed { count: usize, last_error: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("API request failed with status {status} after {retries} retries")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("Assistant request failed: {0}")]
    Assistant(String),

    #[error("No choices in completion response")]
    NoResponseData,

    #[error("Failed to parse model response: {0}")]
    ResponseParse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipeSightError>;

use serde::Deserialize;
use thiserror::Error;

// Shape of the JSON body OSRM sends with a non-Ok code
#[derive(Deserialize, Debug)]
pub struct OsrmErrorPayload {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("No route found between the requested points")]
    NoRoute,

    // Structured error reported by the routing engine
    #[error("API Error ({code}): {message}")]
    ApiError { code: String, message: String },

    // Non-success status whose body isn't the expected JSON
    #[error("Unstructured API Error: {0}")]
    RawApiError(String),

    #[error("Underlying request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

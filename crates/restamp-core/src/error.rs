use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestampError {
    #[error("html parse error: {0}")]
    Parse(String),

    #[error("invalid selector `{0}`")]
    Selector(String),

    #[error("dom mutation error: {0}")]
    Dom(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RestampResult<T> = Result<T, RestampError>;

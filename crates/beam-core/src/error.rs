pub type CoreResult<T> = Result<T, CoreError>;

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("preset error: {0}")]
    Preset(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn preset(msg: impl Into<String>) -> Self {
        Self::Preset(msg.into())
    }
}

pub type RecordResult<T> = Result<T, RecordError>;

#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("recording unavailable: {0}")]
    Unavailable(String),

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("muxer error: {0}")]
    Muxer(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("invalid session state: {0}")]
    State(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RecordError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder(msg.into())
    }

    pub fn muxer(msg: impl Into<String>) -> Self {
        Self::Muxer(msg.into())
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio(msg.into())
    }
}

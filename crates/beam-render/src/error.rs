pub type RenderResult<T> = Result<T, RenderError>;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("GL error: {0}")]
    Gl(String),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("no source texture attached")]
    NoSource,
}

impl RenderError {
    pub fn gl(msg: impl Into<String>) -> Self {
        Self::Gl(msg.into())
    }

    pub fn surface(msg: impl Into<String>) -> Self {
        Self::Surface(msg.into())
    }
}

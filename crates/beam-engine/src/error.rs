use beam_core::CoreError;
use beam_record::RecordError;
use beam_render::RenderError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert_eq!(EngineError::config("bad size").to_string(), "config error: bad size");
        let render = EngineError::from(RenderError::NoSource);
        assert_eq!(render.to_string(), "no source texture attached");
        let serde = serde_json::from_str::<u32>("{").unwrap_err();
        assert!(EngineError::from(serde).to_string().starts_with("serialization error:"));
    }
}

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),

    #[error("config write error: {0}")]
    WriteError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SidekickError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("chat error: {0}")]
    Chat(String),

    #[error("panel error: {0}")]
    Panel(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("temperature out of range".into());
        assert_eq!(
            err.to_string(),
            "config validation error: temperature out of range"
        );

        let err = ConfigError::WriteError("read-only filesystem".into());
        assert_eq!(err.to_string(), "config write error: read-only filesystem");
    }

    #[test]
    fn sidekick_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: SidekickError = config_err.into();
        assert!(matches!(err, SidekickError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn sidekick_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: SidekickError = io_err.into();
        assert!(matches!(err, SidekickError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn sidekick_error_other_variants() {
        let err = SidekickError::Chat("model unavailable".into());
        assert_eq!(err.to_string(), "chat error: model unavailable");

        let err = SidekickError::Panel("surface detached".into());
        assert_eq!(err.to_string(), "panel error: surface detached");

        let err = SidekickError::Other("something went wrong".into());
        assert_eq!(err.to_string(), "something went wrong");
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("failed to read or parse config file {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("bar section '[{0}]' is missing from the config file")]
    MissingBarSection(String),

    #[error("no blocks configured and -e (run if empty) was not passed")]
    NoBlocksWithoutRunIfEmpty,

    #[error(transparent)]
    InvalidField(#[from] lemon_core::LemonError),

    #[error("required environment variable '{0}' is not set")]
    MissingEnv(String),
}

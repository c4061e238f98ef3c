#[derive(thiserror::Error, Debug)]
pub enum LemonError {
    #[error("invalid block mode '{0}': expected once, timed, sparked, or live")]
    InvalidMode(String),

    #[error("invalid alignment '{0}': expected left, center, or right")]
    InvalidAlign(String),

    #[error("block '{sid}' is sparked but declares no trigger command")]
    SparkedBlockMissingTrigger { sid: String },

    #[error("block '{sid}' not found")]
    BlockNotFound { sid: String },

    #[error("format string references unknown block '{sid}'")]
    UnknownFormatToken { sid: String },
}

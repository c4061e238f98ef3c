#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("failed to spawn renderer: {0}")]
    RendererSpawn(#[from] lemon_process::ProcessError),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("renderer exited unexpectedly (code {code:?})")]
    RendererExited { code: Option<i32> },

    #[error("failed to write to renderer: {0}")]
    RendererWrite(#[source] lemon_process::ProcessError),
}

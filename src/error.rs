use thiserror::Error;

/// Errors surfaced to callers. Arithmetic failures inside trees never reach
/// this type: protected primitives degrade to documented sentinels so a
/// poisoned sample cannot abort a generation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid dataset or engine options, rejected before evolution starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Unrecoverable setup failure; the generation loop never starts.
    #[error("engine setup failed: {0}")]
    Fatal(String),

    /// Checkpoint serialization or IO failure. Engine state is untouched.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}

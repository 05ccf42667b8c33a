use thiserror::Error;

#[derive(Debug, Error)]
pub enum PkgError {
    #[error("{0}")]
    Format(String),
    #[error("{0}")]
    Truncated(String),
    #[error("zRIF content id '{license}' doesn't match pkg '{package}'")]
    ContentMismatch { license: String, package: String },
    #[error("{0}")]
    Usage(String),
}

impl PkgError {
    pub(crate) fn format(msg: impl Into<String>) -> anyhow::Error {
        Self::Format(msg.into()).into()
    }
    pub(crate) fn truncated(msg: impl Into<String>) -> anyhow::Error {
        Self::Truncated(msg.into()).into()
    }
}

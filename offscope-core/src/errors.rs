//! Error types for the exporter crates

/// Typed failures raised while decoding debug info and resolving types.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed container: {0}")]
    Format(String),
    #[error("dangling type reference {0:#x}")]
    DanglingReference(u64),
    #[error("unsupported record: {0}")]
    UnsupportedRecord(String),
    #[error("corrupt input: {0}")]
    CorruptInput(String),
    #[error("usage error: {0}")]
    Usage(String),
}

impl ExportError {
    /// IO error for a read past the end of a mapped input.
    pub fn read_past_end(what: &str) -> Self {
        ExportError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("read past end of {what}"),
        ))
    }
}

/// Result type used throughout the exporter.
pub type Result<T> = anyhow::Result<T>;

//! Core error types for Basalt

/// Every failure the protocol engine can surface.
///
/// The first four variants are the fatal categories: any of them ends the
/// connection through the single teardown path. The remaining variants are
/// ambient failures raised by I/O, configuration and data loading.
#[derive(thiserror::Error, Debug)]
pub enum BasaltError {
    /// Unexpected packet id, state or field value.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Malformed frame length, varint or compressed stream.
    #[error("Frame corrupt: {0}")]
    FrameCorrupt(String),

    /// Verification token mismatch or identity rejection.
    #[error("Authentication failure: {0}")]
    AuthenticationFailure(String),

    /// The peer stopped answering keep-alive challenges.
    #[error("Liveness timeout: keep-alive ceiling reached")]
    LivenessTimeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl BasaltError {
    /// Whether this error must tear the connection down.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NotFound(_) | Self::Config(_))
    }

    /// Text shown to the client when the connection is closed because of this error.
    ///
    /// Returns `None` for categories that close without a reason packet.
    pub fn disconnect_reason(&self) -> Option<String> {
        match self {
            Self::ProtocolViolation(reason) => Some(reason.clone()),
            Self::AuthenticationFailure(reason) => Some(reason.clone()),
            Self::Encryption(_) => Some("Encryption error".to_string()),
            Self::InvalidData(_) => Some("Invalid data".to_string()),
            Self::FrameCorrupt(_) | Self::LivenessTimeout | Self::Io(_) => None,
            Self::Compression(_) | Self::Config(_) | Self::NotFound(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BasaltError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_categories() {
        assert!(BasaltError::ProtocolViolation("x".into()).is_fatal());
        assert!(BasaltError::FrameCorrupt("x".into()).is_fatal());
        assert!(BasaltError::AuthenticationFailure("x".into()).is_fatal());
        assert!(BasaltError::LivenessTimeout.is_fatal());
        assert!(!BasaltError::NotFound("x".into()).is_fatal());
    }

    #[test]
    fn test_disconnect_reason() {
        let err = BasaltError::AuthenticationFailure("Invalid token".into());
        assert_eq!(err.disconnect_reason().as_deref(), Some("Invalid token"));
        assert!(BasaltError::LivenessTimeout.disconnect_reason().is_none());
    }
}

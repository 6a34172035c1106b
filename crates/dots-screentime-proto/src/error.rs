use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame length {length} (limit {max} bytes)")]
    InvalidLength { length: u32, max: usize },

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response for request {got} does not match request {expected}")]
    RequestIdMismatch { expected: String, got: String },
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),

    #[error("Daemon error: {0}")]
    Server(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<ClientError> },
}

impl ClientError {
    /// Timeouts and transport failures are worth another attempt. A reply
    /// that arrived but could not be understood is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Timeout(_) | ClientError::Io(_))
    }
}

impl From<ProtocolError> for ClientError {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::Io(e) => ClientError::Io(e),
            other => ClientError::Protocol(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ClientError::Timeout(5000).is_retryable());
        assert!(ClientError::Io(std::io::ErrorKind::ConnectionRefused.into()).is_retryable());
        assert!(!ClientError::Server("Unknown action".to_string()).is_retryable());

        let oversize = ProtocolError::InvalidLength { length: u32::MAX, max: 1024 };
        assert!(!ClientError::from(oversize).is_retryable());

        let eof = ProtocolError::Io(std::io::ErrorKind::UnexpectedEof.into());
        assert!(ClientError::from(eof).is_retryable());
    }
}

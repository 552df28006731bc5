//! Session service errors.

use thiserror::Error;
use tracing::error;

use vsess_media::MediaError;
use vsess_storage::StorageError;

pub type SessionResult<T> = Result<T, SessionError>;

/// Failures of session operations, as reported to clients.
///
/// Messages are safe to show: they never carry filesystem paths or FFmpeg
/// output. The underlying cause is logged where the error is created.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Encode(String),

    #[error("{0}")]
    Internal(String),
}

impl SessionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Machine readable error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Decode(_) => "decode_error",
            Self::Encode(_) => "encode_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Log a storage failure and describe it without internals.
    pub(crate) fn from_storage(context: &str, err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) | StorageError::InvalidName(_) => {
                Self::not_found(format!("{} not found", context))
            }
            other => {
                error!(error = %other, "Storage failure: {}", context);
                Self::internal(format!("{} failed", context))
            }
        }
    }

    /// Log a decode-side media failure.
    pub(crate) fn decode(context: &str, err: MediaError) -> Self {
        Self::from_media(context, err, Self::Decode)
    }

    /// Log an encode-side media failure.
    pub(crate) fn encode(context: &str, err: MediaError) -> Self {
        Self::from_media(context, err, Self::Encode)
    }

    fn from_media(context: &str, err: MediaError, kind: fn(String) -> Self) -> Self {
        if let Some(stderr) = err.stderr() {
            error!(error = %err, stderr = %stderr, "Media failure: {}", context);
        } else {
            error!(error = %err, "Media failure: {}", context);
        }

        match err {
            e if e.is_tooling_missing() => Self::internal("video tooling is not available"),
            MediaError::Timeout(secs) => kind(format!("{} timed out after {} seconds", context, secs)),
            MediaError::Io(_) | MediaError::Internal(_) => Self::internal(format!("{} failed", context)),
            _ => kind(format!("{} failed", context)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_codes() {
        assert_eq!(SessionError::validation("x").code(), "validation_error");
        assert_eq!(SessionError::not_found("x").code(), "not_found");
        assert_eq!(SessionError::internal("x").code(), "internal_error");
    }

    #[test]
    fn test_media_errors_hide_details() {
        let err = SessionError::decode(
            "frame decode",
            MediaError::ffmpeg_failed("failed", Some("/srv/uploads/abc.mp4: Invalid data".into()), Some(1)),
        );
        assert!(matches!(err, SessionError::Decode(_)));
        assert_eq!(err.to_string(), "frame decode failed");

        let err = SessionError::decode("probe", MediaError::FileNotFound(PathBuf::from("/srv/x")));
        assert!(!err.to_string().contains("/srv"));
    }

    #[test]
    fn test_timeouts_keep_their_kind() {
        let err = SessionError::encode("render", MediaError::Timeout(1800));
        assert!(matches!(err, SessionError::Encode(_)));
        assert!(err.to_string().contains("1800"));
    }

    #[test]
    fn test_missing_tooling_is_internal() {
        let err = SessionError::encode("render", MediaError::FfmpegNotFound);
        assert!(matches!(err, SessionError::Internal(_)));
    }

    #[test]
    fn test_storage_not_found() {
        let err = SessionError::from_storage("artifact", StorageError::not_found("x.mp4"));
        assert!(matches!(err, SessionError::NotFound(_)));
        assert_eq!(err.to_string(), "artifact not found");
    }
}

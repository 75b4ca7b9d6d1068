use std::path::PathBuf;

use thiserror::Error;

/// Every failure the host can observe.
///
/// Only [`HostError::is_fatal`] errors may terminate the process; all other
/// variants are converted to a negative result at the boundary of the
/// operation that raised them.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("failed to create partition {name}: {reason}")]
    PartitionCreate { name: String, reason: String },

    #[error("partition {0} was already created in this process")]
    PartitionExists(String),

    #[error("failed to load extension from {}: {reason}", path.display())]
    ExtensionLoad { path: PathBuf, reason: String },

    #[error("failed to remove extension {id}: {reason}")]
    ExtensionUnload { id: String, reason: String },

    #[error("invalid extension manifest at {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error("settings store error: {0}")]
    Store(String),

    #[error("file dialog error: {0}")]
    Dialog(String),

    #[error("window error: {0}")]
    Window(String),
}

impl HostError {
    /// Partition failures mean the host environment is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HostError::PartitionCreate { .. } | HostError::PartitionExists(_)
        )
    }
}

pub type HostResult<T> = Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_partition_errors_are_fatal() {
        assert!(HostError::PartitionExists("persist:x".into()).is_fatal());
        assert!(HostError::PartitionCreate {
            name: "persist:x".into(),
            reason: "read-only".into()
        }
        .is_fatal());

        assert!(!HostError::Window("no display".into()).is_fatal());
        assert!(!HostError::Store("disk full".into()).is_fatal());
        assert!(!HostError::ExtensionLoad {
            path: PathBuf::from("/opt/HaramBlur"),
            reason: "missing manifest".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_error_messages_name_the_path() {
        let err = HostError::ExtensionLoad {
            path: PathBuf::from("/opt/HaramBlur"),
            reason: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to load extension from /opt/HaramBlur: boom"
        );
    }
}

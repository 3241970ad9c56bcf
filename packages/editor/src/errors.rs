//! Error types for the editor's background workers

use thiserror::Error;

use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Autosave worker has stopped")]
    AutosaveStopped,
}

pub type EditorResult<T> = Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_convert() {
        let err: EditorError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, EditorError::Store(StoreError::Unavailable(_))));
        assert_eq!(err.to_string(), "Storage error: Storage unavailable: down");
    }
}

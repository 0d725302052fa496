//! Mapping lower-layer errors into the chat taxonomy.

use chat_core::ChatError;
use chat_database::DatabaseError;
use tracing::error;

/// Convert a persistence error into a [`ChatError`].
pub(crate) fn db_error(err: DatabaseError) -> ChatError {
    match err {
        DatabaseError::NotFound { entity, id } => ChatError::NotFound { entity, id },
        DatabaseError::Invalid(e) => ChatError::Validation(e.to_string()),
        other => {
            error!("Storage failure: {}", other);
            ChatError::Storage(other.to_string())
        }
    }
}

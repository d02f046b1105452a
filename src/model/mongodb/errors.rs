//! The mongodb crate leaves it to callers to decide which failures are worth
//! retrying. This module makes that call in one place.

use mongodb::error::{
    Error as DbError, ErrorKind, RETRYABLE_WRITE_ERROR, TRANSIENT_TRANSACTION_ERROR,
};

/// Return true if the error is an infrastructure fault that may succeed on retry.
pub fn is_transient(err: &DbError) -> bool {
    if err.contains_label(RETRYABLE_WRITE_ERROR) || err.contains_label(TRANSIENT_TRANSACTION_ERROR)
    {
        return true;
    }
    matches!(
        *err.kind,
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. }
    )
}

use mongodb::error::{ErrorKind, WriteFailure};

/// Errors from the store adapter.
///
/// Duplicate-key conditions are not a distinct variant — the adapter's
/// contract (§4.B) is to inspect and swallow them inline at the call
/// site, since they indicate a benign cross-path dedup rather than a
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("bson serialization error: {0}")]
    Bson(#[from] bson::ser::Error),
}

pub type Result<T, E = StoreError> = core::result::Result<T, E>;

const DUPLICATE_KEY_CODE: i32 = 11000;

/// True if `err` is a unique-index violation rather than a genuine
/// write failure. Used by `insert_message` and `seed_backfill` to
/// silently succeed on collision (§4.B, §7).
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY_CODE,
        ErrorKind::BulkWrite(failure) => failure
            .write_errors
            .iter()
            .flatten()
            .any(|we| we.code == DUPLICATE_KEY_CODE),
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use mongodb::error::{CommandError, Error as MongoError, WriteError};

    use super::*;

    fn write_error(code: i32) -> MongoError {
        let we: WriteError = bson::from_document(doc! {
            "code": code,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error collection",
        })
        .expect("well-formed write error document");
        MongoError::from(ErrorKind::Write(WriteFailure::WriteError(we)))
    }

    fn command_error(code: i32) -> MongoError {
        let ce: CommandError = bson::from_document(doc! {
            "code": code,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error collection",
        })
        .expect("well-formed command error document");
        MongoError::from(ErrorKind::Command(ce))
    }

    #[test]
    fn detects_duplicate_key_write_error() {
        assert!(is_duplicate_key(&write_error(DUPLICATE_KEY_CODE)));
    }

    #[test]
    fn detects_duplicate_key_command_error() {
        assert!(is_duplicate_key(&command_error(DUPLICATE_KEY_CODE)));
    }

    #[test]
    fn rejects_non_duplicate_write_error_codes() {
        assert!(!is_duplicate_key(&write_error(11)));
    }

    #[test]
    fn rejects_non_duplicate_command_error_codes() {
        assert!(!is_duplicate_key(&command_error(11)));
    }
}

//! Typed failures raised by the record layer. They travel inside
//! `anyhow::Error` chains so call sites keep using `?` and `.context(..)`,
//! while the UI and the tests can still tell a duplicate code apart from an
//! I/O problem.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    /// Another student already uses this code.
    #[error("Le code élève {0} existe déjà.")]
    DuplicateCode(String),
    /// A mandatory field was blank after trimming.
    #[error("Champ obligatoire manquant : {0}.")]
    MissingField(&'static str),
    /// Input was present but unusable (negative amount, empty message...).
    #[error("{0}")]
    Validation(String),
    /// The targeted row does not exist.
    #[error("{0} introuvable.")]
    NotFound(&'static str),
}

/// Walk an error chain and return the first `StoreError` found.
pub fn find_store_error(err: &anyhow::Error) -> Option<&StoreError> {
    err.chain().find_map(|cause| cause.downcast_ref::<StoreError>())
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn finds_store_error_beneath_context() {
        let result: anyhow::Result<()> =
            Err(anyhow::Error::new(StoreError::NotFound("Élève"))).context("failed to load student");
        let err = result.unwrap_err();
        assert_eq!(find_store_error(&err), Some(&StoreError::NotFound("Élève")));
    }

    #[test]
    fn plain_errors_have_no_store_error() {
        let err = anyhow::anyhow!("disk on fire");
        assert!(find_store_error(&err).is_none());
    }
}

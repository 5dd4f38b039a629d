use crate::{
    document::StoredQueryDocument,
    validate::{ValidationError, ValidationLevel, validate_with},
};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use storq_schema::ParamSchema;
use thiserror::Error as ThisError;

///
/// PreconditionMode
///
/// How the repository gates concurrent replace and delete operations.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PreconditionMode {
    /// Callers must present the content hash of the revision they last read.
    #[default]
    ContentHash,

    /// Callers must present the modification timestamp they last observed.
    LastModified,
}

///
/// Precondition
///
/// Caller-asserted knowledge of the current revision. A replace or delete
/// only proceeds when the assertion matches the stored revision.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Precondition {
    /// Hex-encoded Sha256 of the revision the caller last read.
    Hash(String),

    /// Microsecond timestamp of the revision the caller last observed.
    UnmodifiedSince(u64),
}

///
/// RepositoryConfig
///

#[derive(Clone, Copy, Debug, Default)]
pub struct RepositoryConfig {
    pub precondition: PreconditionMode,
    pub validation: ValidationLevel,
}

///
/// Revision
///
/// Identity of a stored document version, returned from every successful
/// write so callers can build the precondition for their next one.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Revision {
    /// Hex-encoded Sha256 over the canonical JSON serialization.
    pub hash: String,

    /// Microseconds since the Unix epoch, as supplied by the caller.
    pub last_modified_micros: u64,
}

///
/// RepositoryError
///

#[derive(Debug, ThisError)]
pub enum RepositoryError {
    #[error("no stored query with id `{id}`")]
    NotFound { id: String },

    #[error("a stored query with id `{id}` already exists")]
    AlreadyExists { id: String },

    #[error("a precondition is required to modify `{id}`")]
    PreconditionRequired { id: String },

    #[error("the precondition for `{id}` does not match the current revision")]
    PreconditionFailed { id: String },

    #[error("the stored query is invalid ({} error(s))", errors.len())]
    Invalid { errors: Vec<ValidationError> },

    #[error("could not serialize the stored query: {message}")]
    Encode { message: String },
}

impl RepositoryError {
    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub(crate) fn precondition_failed(id: impl Into<String>) -> Self {
        Self::PreconditionFailed { id: id.into() }
    }
}

///
/// QueryRepository
///
/// In-memory store of parameterized query documents keyed by their opaque
/// id. Every write re-derives the effective parameter table and validates
/// the document before it is admitted; replaces and deletes are guarded by
/// optimistic concurrency against the stored revision.
///

#[derive(Debug, Default)]
pub struct QueryRepository {
    config: RepositoryConfig,
    entries: BTreeMap<String, Entry>,
}

#[derive(Debug)]
struct Entry {
    document: StoredQueryDocument,
    revision: Revision,
}

impl QueryRepository {
    #[must_use]
    pub fn new(config: RepositoryConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
        }
    }

    /// Ids of every stored document, in lexicographic order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StoredQueryDocument> {
        self.entries.get(id).map(|entry| &entry.document)
    }

    #[must_use]
    pub fn revision(&self, id: &str) -> Option<&Revision> {
        self.entries.get(id).map(|entry| &entry.revision)
    }

    /// The effective parameter table of a stored document, as derived at
    /// write time.
    #[must_use]
    pub fn effective_parameters(&self, id: &str) -> Option<&BTreeMap<String, ParamSchema>> {
        self.get(id).map(StoredQueryDocument::effective_parameters)
    }

    /// Insert a new document. Fails when the id is already taken.
    pub fn put(
        &mut self,
        mut document: StoredQueryDocument,
        now_micros: u64,
    ) -> Result<Revision, RepositoryError> {
        if self.entries.contains_key(&document.id) {
            return Err(RepositoryError::AlreadyExists {
                id: document.id.clone(),
            });
        }

        let revision = self.admit(&mut document, now_micros)?;
        self.entries.insert(
            document.id.clone(),
            Entry {
                document,
                revision: revision.clone(),
            },
        );

        Ok(revision)
    }

    /// Replace an existing document under optimistic concurrency.
    pub fn replace(
        &mut self,
        mut document: StoredQueryDocument,
        precondition: Option<&Precondition>,
        now_micros: u64,
    ) -> Result<Revision, RepositoryError> {
        let id = document.id.clone();
        let current = self
            .entries
            .get(&id)
            .ok_or_else(|| RepositoryError::not_found(&id))?;

        self.check_precondition(&id, &current.revision, precondition)?;

        let revision = self.admit(&mut document, now_micros)?;
        self.entries.insert(
            id,
            Entry {
                document,
                revision: revision.clone(),
            },
        );

        Ok(revision)
    }

    /// Delete a stored document under optimistic concurrency.
    pub fn delete(
        &mut self,
        id: &str,
        precondition: Option<&Precondition>,
    ) -> Result<StoredQueryDocument, RepositoryError> {
        let current = self
            .entries
            .get(id)
            .ok_or_else(|| RepositoryError::not_found(id))?;

        self.check_precondition(id, &current.revision, precondition)?;

        // Checked above, so the entry is still present.
        let entry = self
            .entries
            .remove(id)
            .ok_or_else(|| RepositoryError::not_found(id))?;

        Ok(entry.document)
    }

    /// Validate, refresh the derived parameter table, and compute the new
    /// revision. Shared by put and replace.
    fn admit(
        &self,
        document: &mut StoredQueryDocument,
        now_micros: u64,
    ) -> Result<Revision, RepositoryError> {
        crate::collect::refresh(document);

        let errors = validate_with(document, self.config.validation);
        if !errors.is_empty() {
            return Err(RepositoryError::Invalid { errors });
        }

        Ok(Revision {
            hash: content_hash(document)?,
            last_modified_micros: now_micros,
        })
    }

    fn check_precondition(
        &self,
        id: &str,
        current: &Revision,
        supplied: Option<&Precondition>,
    ) -> Result<(), RepositoryError> {
        let Some(supplied) = supplied else {
            return Err(RepositoryError::PreconditionRequired { id: id.to_string() });
        };

        let matches = match (self.config.precondition, supplied) {
            (PreconditionMode::ContentHash, Precondition::Hash(hash)) => *hash == current.hash,
            (PreconditionMode::LastModified, Precondition::UnmodifiedSince(micros)) => {
                *micros == current.last_modified_micros
            }
            // Wrong kind of assertion for the configured mode.
            _ => false,
        };

        if matches {
            Ok(())
        } else {
            Err(RepositoryError::precondition_failed(id))
        }
    }
}

/// Hex-encoded Sha256 over the canonical JSON serialization of a document.
pub fn content_hash(document: &StoredQueryDocument) -> Result<String, RepositoryError> {
    let bytes = serde_json::to_vec(document).map_err(|err| RepositoryError::Encode {
        message: err.to_string(),
    })?;

    use std::fmt::Write as _;

    let digest = Sha256::digest(&bytes);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // Infallible for String.
        let _ = write!(hex, "{byte:02x}");
    }

    Ok(hex)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{param::ValueOrParameter, validate::ValidationError};
    use storq_schema::ParamSchema;

    fn doc(id: &str) -> StoredQueryDocument {
        let mut doc = StoredQueryDocument::new(id);
        doc.collections = vec![ValueOrParameter::Literal("obs".to_string())];
        doc
    }

    fn parameterized_doc(id: &str) -> StoredQueryDocument {
        let mut doc = doc(id).declare("lim", ParamSchema::integer().with_default(10.into()));
        doc.limit = Some(ValueOrParameter::parameter("lim"));
        doc
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut repo = QueryRepository::default();
        let revision = repo.put(doc("daily"), 1_000).unwrap();

        assert_eq!(revision.last_modified_micros, 1_000);
        assert_eq!(revision.hash.len(), 64);
        assert!(repo.get("daily").is_some());
        assert_eq!(repo.ids(), vec!["daily"]);
    }

    #[test]
    fn put_rejects_duplicate_ids() {
        let mut repo = QueryRepository::default();
        repo.put(doc("daily"), 1).unwrap();

        let err = repo.put(doc("daily"), 2).unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists { .. }));
    }

    #[test]
    fn put_rejects_invalid_documents() {
        let mut repo = QueryRepository::default();
        let empty = StoredQueryDocument::new("broken");

        let err = repo.put(empty, 1).unwrap_err();
        let RepositoryError::Invalid { errors } = err else {
            panic!("expected validation failure");
        };
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::CollectionCardinality { .. }))
        );
    }

    #[test]
    fn put_refreshes_the_effective_parameter_table() {
        let mut repo = QueryRepository::default();
        repo.put(parameterized_doc("daily"), 1).unwrap();

        let effective = repo.effective_parameters("daily").unwrap();
        assert!(effective.contains_key("lim"));
    }

    #[test]
    fn replace_requires_a_precondition() {
        let mut repo = QueryRepository::default();
        repo.put(doc("daily"), 1).unwrap();

        let err = repo.replace(doc("daily"), None, 2).unwrap_err();
        assert!(matches!(err, RepositoryError::PreconditionRequired { .. }));
    }

    #[test]
    fn replace_with_matching_hash_succeeds() {
        let mut repo = QueryRepository::default();
        let first = repo.put(doc("daily"), 1).unwrap();

        let mut updated = doc("daily");
        updated.title = Some("Daily observations".to_string());

        let precondition = Precondition::Hash(first.hash.clone());
        let second = repo
            .replace(updated, Some(&precondition), 2)
            .unwrap();

        assert_ne!(second.hash, first.hash);
        assert_eq!(second.last_modified_micros, 2);
        assert_eq!(
            repo.get("daily").unwrap().title.as_deref(),
            Some("Daily observations")
        );
    }

    #[test]
    fn replace_with_stale_hash_fails() {
        let mut repo = QueryRepository::default();
        let first = repo.put(doc("daily"), 1).unwrap();

        // The intermediate replace must change the content: identical
        // content hashes to the same revision, so the old hash would still
        // match.
        let mut updated = doc("daily");
        updated.title = Some("moved".to_string());

        let stale = Precondition::Hash(first.hash.clone());
        repo.replace(updated, Some(&stale), 2).unwrap();

        // A second writer still holding the original hash loses the race.
        let err = repo.replace(doc("daily"), Some(&stale), 3).unwrap_err();
        assert!(matches!(err, RepositoryError::PreconditionFailed { .. }));
    }

    #[test]
    fn replacing_identical_content_keeps_the_same_hash() {
        let mut repo = QueryRepository::default();
        let first = repo.put(doc("daily"), 1).unwrap();

        let same = Precondition::Hash(first.hash.clone());
        let second = repo.replace(doc("daily"), Some(&same), 2).unwrap();

        assert_eq!(second.hash, first.hash);
        assert_eq!(second.last_modified_micros, 2);
    }

    #[test]
    fn replace_of_missing_id_fails() {
        let mut repo = QueryRepository::default();
        let precondition = Precondition::Hash("0".repeat(64));

        let err = repo.replace(doc("ghost"), Some(&precondition), 1).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn delete_with_matching_precondition_removes_the_document() {
        let mut repo = QueryRepository::default();
        let revision = repo.put(doc("daily"), 1).unwrap();

        let removed = repo
            .delete("daily", Some(&Precondition::Hash(revision.hash)))
            .unwrap();
        assert_eq!(removed.id, "daily");
        assert!(repo.is_empty());
    }

    #[test]
    fn delete_with_wrong_hash_fails() {
        let mut repo = QueryRepository::default();
        repo.put(doc("daily"), 1).unwrap();

        let wrong = Precondition::Hash("0".repeat(64));
        let err = repo.delete("daily", Some(&wrong)).unwrap_err();
        assert!(matches!(err, RepositoryError::PreconditionFailed { .. }));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn last_modified_mode_checks_the_timestamp() {
        let config = RepositoryConfig {
            precondition: PreconditionMode::LastModified,
            ..RepositoryConfig::default()
        };
        let mut repo = QueryRepository::new(config);
        repo.put(doc("daily"), 500).unwrap();

        let err = repo
            .delete("daily", Some(&Precondition::UnmodifiedSince(400)))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::PreconditionFailed { .. }));

        repo.delete("daily", Some(&Precondition::UnmodifiedSince(500)))
            .unwrap();
        assert!(repo.is_empty());
    }

    #[test]
    fn hash_precondition_is_rejected_in_timestamp_mode() {
        let config = RepositoryConfig {
            precondition: PreconditionMode::LastModified,
            ..RepositoryConfig::default()
        };
        let mut repo = QueryRepository::new(config);
        let revision = repo.put(doc("daily"), 500).unwrap();

        let err = repo
            .delete("daily", Some(&Precondition::Hash(revision.hash)))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::PreconditionFailed { .. }));
    }

    #[test]
    fn static_validation_skips_the_deep_dry_run() {
        // A parameter without a default fails the deep dry run but is
        // acceptable to the static level.
        let mut doc = doc("daily").declare("lim", ParamSchema::integer());
        doc.limit = Some(ValueOrParameter::parameter("lim"));

        let config = RepositoryConfig {
            validation: ValidationLevel::Static,
            ..RepositoryConfig::default()
        };
        let mut repo = QueryRepository::new(config);
        repo.put(doc, 1).unwrap();
    }

    #[test]
    fn content_hash_is_stable_and_content_sensitive() {
        let a = content_hash(&doc("daily")).unwrap();
        let b = content_hash(&doc("daily")).unwrap();
        assert_eq!(a, b);

        let mut other = doc("daily");
        other.title = Some("changed".to_string());
        assert_ne!(a, content_hash(&other).unwrap());
    }
}

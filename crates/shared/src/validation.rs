//! Common validation utilities.

use validator::ValidationError;

/// Maximum length of a document store index name.
const MAX_INDEX_NAME_LENGTH: usize = 255;

/// Characters the document store refuses in index names and search targets.
const FORBIDDEN_INDEX_CHARS: [char; 8] = ['\\', '/', '?', '"', '<', '>', '|', '#'];

/// Validates a source index name.
///
/// The name is used as a search target, so `*` wildcards and `,` separated
/// lists are accepted. The tenant owning a report is encoded as the index
/// prefix before the first `-`, so the prefix must be non-empty.
pub fn validate_index_name(index: &str) -> Result<(), ValidationError> {
    if index.is_empty() || index.len() > MAX_INDEX_NAME_LENGTH {
        let mut err = ValidationError::new("index_length");
        err.message = Some("Index name must be 1-255 characters".into());
        return Err(err);
    }

    if index.chars().any(|c| c.is_whitespace() || FORBIDDEN_INDEX_CHARS.contains(&c)) {
        let mut err = ValidationError::new("index_characters");
        err.message = Some("Index name contains forbidden characters".into());
        return Err(err);
    }

    if index.starts_with('-') {
        let mut err = ValidationError::new("index_tenant");
        err.message = Some("Index name must start with a tenant prefix".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a free-text field is not blank.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

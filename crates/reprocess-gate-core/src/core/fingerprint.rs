// crates/reprocess-gate-core/src/core/fingerprint.rs
// ============================================================================
// Module: Reprocess Gate Field Fingerprints
// Description: Selective, canonical hashing of upstream records.
// Purpose: Detect meaningful upstream changes while ignoring volatile metadata.
// Dependencies: serde, serde_jcs, serde_json, sha2
// ============================================================================

//! ## Overview
//! A [`FieldProfile`] names the record fields that affect downstream
//! computation. [`compute_fingerprint`] hashes only those fields, so scrape
//! timestamps, file paths, and retry counters can churn without forcing every
//! downstream stage to recompute.
//!
//! Values are canonicalized with RFC 8785 (JCS) before hashing, which makes
//! the fingerprint independent of record key order and number formatting.
//! Writers persist the same fingerprint next to each row so the gate's
//! recomputed value and the stored value are directly comparable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 16;

/// Flat key/value record as produced by upstream writers.
pub type Record = Map<String, Value>;

// ============================================================================
// SECTION: Fingerprint
// ============================================================================

/// Fixed-length lowercase hex fingerprint over a record's profiled fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps a previously persisted fingerprint string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncates a SHA-256 digest to the fingerprint length.
    fn from_digest(digest: &[u8]) -> Self {
        let mut value = hex_encode(digest);
        value.truncate(FINGERPRINT_LEN);
        Self(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Field Profiles
// ============================================================================

/// Named, ordered selection of fields that participate in a fingerprint.
///
/// # Invariants
/// - `fields` is non-empty and free of duplicates (see [`FieldProfile::validate`]).
/// - Every key in `defaults` is also listed in `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProfile {
    /// Profile name, usually the record type it applies to.
    pub name: String,
    /// Ordered list of fields included in the fingerprint.
    pub fields: Vec<String>,
    /// Values substituted for fields absent from a record.
    #[serde(default)]
    pub defaults: BTreeMap<String, Value>,
}

impl FieldProfile {
    /// Creates a profile without defaults.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            defaults: BTreeMap::new(),
        }
    }

    /// Adds a default value used when `field` is absent from a record.
    #[must_use]
    pub fn with_default(mut self, field: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(field.into(), value);
        self
    }

    /// Validates the profile declaration.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] when the profile is empty, repeats a field, or
    /// declares a default for an unlisted field.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.name.trim().is_empty() {
            return Err(ProfileError::Invalid("field profile name must be non-empty".to_string()));
        }
        if self.fields.is_empty() {
            return Err(ProfileError::Invalid(format!(
                "field profile `{}` must list at least one field",
                self.name
            )));
        }
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if field.trim().is_empty() {
                return Err(ProfileError::Invalid(format!(
                    "field profile `{}` contains an empty field name",
                    self.name
                )));
            }
            if !seen.insert(field.as_str()) {
                return Err(ProfileError::Invalid(format!(
                    "field profile `{}` lists `{field}` more than once",
                    self.name
                )));
            }
        }
        if let Some(orphan) = self.defaults.keys().find(|key| !seen.contains(key.as_str())) {
            return Err(ProfileError::Invalid(format!(
                "field profile `{}` declares a default for unlisted field `{orphan}`",
                self.name
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A profiled field was absent from the record and has no default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record is missing field `{field}` required by profile `{profile}`")]
pub struct MissingFieldError {
    /// Profile that requested the field.
    pub profile: String,
    /// Missing field name.
    pub field: String,
}

/// Errors raised when computing fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FingerprintError {
    /// Record lacks a profiled field.
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

/// Errors raised by invalid profile declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    /// Profile declaration is malformed.
    #[error("invalid field profile: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// Computes the fingerprint of `record` over the fields named by `profile`.
///
/// Fields outside the profile never influence the result, and neither does
/// the order of keys in the record.
///
/// # Errors
///
/// Returns [`FingerprintError::MissingField`] when a profiled field is absent
/// and the profile declares no default for it.
pub fn compute_fingerprint(
    record: &Record,
    profile: &FieldProfile,
) -> Result<Fingerprint, FingerprintError> {
    let mut selected: Vec<(&str, &Value)> = Vec::with_capacity(profile.fields.len());
    for field in &profile.fields {
        let value =
            record.get(field).or_else(|| profile.defaults.get(field)).ok_or_else(|| {
                MissingFieldError {
                    profile: profile.name.clone(),
                    field: field.clone(),
                }
            })?;
        selected.push((field.as_str(), value));
    }
    let bytes = canonical_json_bytes(&selected)?;
    Ok(Fingerprint::from_digest(&sha256(&bytes)))
}

/// Folds several row fingerprints into one order-independent fingerprint.
///
/// Returns `None` when no fingerprints are supplied.
///
/// # Errors
///
/// Returns [`FingerprintError::Canonicalization`] when serialization fails.
pub fn combine_fingerprints<'a, I>(fingerprints: I) -> Result<Option<Fingerprint>, FingerprintError>
where
    I: IntoIterator<Item = &'a Fingerprint>,
{
    let mut values: Vec<&str> = fingerprints.into_iter().map(Fingerprint::as_str).collect();
    if values.is_empty() {
        return Ok(None);
    }
    values.sort_unstable();
    let bytes = canonical_json_bytes(&values)?;
    Ok(Some(Fingerprint::from_digest(&sha256(&bytes))))
}

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`FingerprintError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, FingerprintError> {
    serde_jcs::to_vec(value).map_err(|err| FingerprintError::Canonicalization(err.to_string()))
}

/// Hashes raw bytes with SHA-256.
fn sha256(bytes: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().to_vec()
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

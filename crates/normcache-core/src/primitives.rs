//! # Primitives
//!
//! Fixed constants of the normalized cache. Compiled in and immutable at
//! runtime.

/// Root entity id for query results.
pub const ROOT_QUERY: &str = "ROOT_QUERY";

/// Root entity id for mutation results.
pub const ROOT_MUTATION: &str = "ROOT_MUTATION";

/// Magic bytes for the canonical binary snapshot header.
pub const MAGIC_BYTES: &[u8; 4] = b"NCSX";

/// Current canonical snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of records accepted from a canonical import.
///
/// This prevents memory exhaustion from malicious or corrupted data.
pub const MAX_IMPORT_ENTITY_COUNT: u64 = 1_000_000;

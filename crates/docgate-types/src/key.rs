//! Composite storage keys.
//!
//! A composite key is the ordered concatenation of a document's category and
//! identifier segments, joined with [`KEY_DELIMITER`]. Segments are taken
//! verbatim: no trimming, no escaping.

/// Delimiter placed between key segments.
pub const KEY_DELIMITER: &str = ":";

/// Join `segments` with `delimiter`, preserving order.
///
/// An empty segment list yields an empty string.
///
/// # Examples
///
/// ```
/// use docgate_types::key::build_key;
///
/// assert_eq!(build_key(&["users", "123"], ":"), "users:123");
/// assert_eq!(build_key(&["users"], ":"), "users");
/// assert_eq!(build_key::<&str>(&[], ":"), "");
/// ```
pub fn build_key<S: AsRef<str>>(segments: &[S], delimiter: &str) -> String {
    let mut key = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            key.push_str(delimiter);
        }
        key.push_str(segment.as_ref());
    }
    key
}

/// The storage key for a document of `datatype` identified by `id`.
pub fn composite_key(datatype: &str, id: &str) -> String {
    build_key(&[datatype, id], KEY_DELIMITER)
}

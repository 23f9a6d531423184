//! Deterministic identity hashing.
//!
//! The primary key of an identity is the SHA-1 hex digest of
//! `source:email:name:username`, lowercased, with `name` reduced to its
//! unaccented form (NFKD, combining marks dropped). Absent fields hash as the
//! empty string. Changing this function invalidates every stored key, so any
//! change needs a data-copy migration.
//!
//! The `:` join is not injective: a field containing `:` can produce the same
//! string as a split across two fields, so `("scm", email "a:b")` and
//! `("scm", email "a", name "b:")` share a key. Stored keys depend on this exact
//! join, so the ambiguity stays; the second of two such tuples is rejected as
//! [`Error::AlreadyExists`].

use sha1::{Digest, Sha1};
use unicode_normalization::{UnicodeNormalization, char::canonical_combining_class};

use crate::{Error, Result};

/// Strip accents: `"Jöhn"` becomes `"John"`.
pub fn unaccent(s: &str) -> String {
  s.nfkd().filter(|c| canonical_combining_class(*c) == 0).collect()
}

/// Compute the identity key for `(source, email, name, username)`.
///
/// Fails with [`Error::InvalidValue`] when `source` is empty or when none of
/// the three identity fields carries a value.
pub fn generate_uuid(
  source: &str,
  email: Option<&str>,
  name: Option<&str>,
  username: Option<&str>,
) -> Result<String> {
  if source.is_empty() {
    return Err(Error::invalid("'source' cannot be an empty string"));
  }

  let present = |v: Option<&str>| v.is_some_and(|s| !s.is_empty());
  if !(present(email) || present(name) || present(username)) {
    return Err(Error::invalid("identity data cannot be empty"));
  }

  let joined = [
    source.to_owned(),
    email.unwrap_or_default().to_owned(),
    unaccent(name.unwrap_or_default()),
    username.unwrap_or_default().to_owned(),
  ]
  .join(":")
  .to_lowercase();

  Ok(hex::encode(Sha1::digest(joined.as_bytes())))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn known_digest() {
    let uuid = generate_uuid(
      "scm",
      Some("jroe@example.com"),
      Some("Jane Roe"),
      Some("jrae"),
    )
    .unwrap();
    assert_eq!(uuid, "eda9f62ad321b1fbe5f283cc05e2484516203117");
    assert_eq!(uuid.len(), 40);
  }

  #[test]
  fn case_and_accents_do_not_matter() {
    let a = generate_uuid("scm", Some("jsmith@example.com"), Some("John Smith"), Some("jsmith"));
    let b = generate_uuid("SCM", Some("JSMITH@example.com"), Some("Jöhn Smïth"), Some("jsmith"));
    assert_eq!(a.unwrap(), "a9b403e150dd4af8953a52a4bb841051e4b705d9");
    assert_eq!(b.unwrap(), "a9b403e150dd4af8953a52a4bb841051e4b705d9");
  }

  #[test]
  fn absent_fields_hash_as_empty() {
    let uuid = generate_uuid("scm", Some("jsmith@example.com"), None, None).unwrap();
    assert_eq!(uuid, "3f0eb1c38060ce3bc6cb1676c8b9660e99354291");

    let same = generate_uuid("scm", Some("jsmith@example.com"), Some(""), Some("")).unwrap();
    assert_eq!(uuid, same);
  }

  #[test]
  fn separator_position_matters() {
    let name = generate_uuid("scm", None, Some("John Smith"), None).unwrap();
    let user = generate_uuid("scm", None, None, Some("John Smith")).unwrap();
    assert_eq!(name, "76e3624e24aacae178d05352ad9a871dfaf81c13");
    assert_ne!(name, user);
  }

  #[test]
  fn colon_in_a_field_is_ambiguous_with_the_separator() {
    let joined = generate_uuid("scm", Some("a:b"), None, None).unwrap();
    let split = generate_uuid("scm", Some("a"), Some("b:"), None).unwrap();
    assert_eq!(joined, split);
  }

  #[test]
  fn four_byte_code_points() {
    let uuid = generate_uuid(
      "scm",
      Some("jsmith@example.com"),
      Some("\u{1F600} Smith"),
      Some("jsmith"),
    )
    .unwrap();
    assert_eq!(uuid, "0dd1aba2ed1d01513eb2d2e5cff25fd8a91694b7");
  }

  #[test]
  fn empty_source_rejected() {
    let err = generate_uuid("", Some("jsmith@example.com"), None, None).unwrap_err();
    assert!(matches!(err, Error::InvalidValue(_)));
  }

  #[test]
  fn empty_identity_rejected() {
    let err = generate_uuid("scm", None, Some(""), None).unwrap_err();
    assert!(matches!(err, Error::InvalidValue(_)));
  }
}

//! Strata Fingerprint
//!
//! A fingerprint is the opaque token two independently built graphs compare to
//! decide whether they describe the same unit of work. The codec is a plain
//! reversible encoding: equal inputs give equal tokens and every token decodes
//! back to the exact bytes it was built from.
//!
//! The token alphabet is URL-safe base64 without padding, so fingerprints can be
//! used in file names, ref names and log lines without quoting.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Error returned when a token is not a fingerprint produced by [`encode`].
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
  /// The token contains characters outside the fingerprint alphabet.
  #[error("invalid fingerprint token '{token}': {source}")]
  InvalidToken {
    token: String,
    #[source]
    source: base64::DecodeError,
  },

  /// The token decodes to bytes that are not UTF-8.
  #[error("fingerprint token '{token}' does not decode to UTF-8 text")]
  NotUtf8 { token: String },
}

/// Encode arbitrary text into a printable fingerprint token.
pub fn encode(text: &str) -> String {
  URL_SAFE_NO_PAD.encode(text.as_bytes())
}

/// Decode a fingerprint token back into the text it was built from.
pub fn decode(token: &str) -> Result<String, FingerprintError> {
  let bytes = URL_SAFE_NO_PAD
    .decode(token.as_bytes())
    .map_err(|source| FingerprintError::InvalidToken {
      token: token.to_string(),
      source,
    })?;

  String::from_utf8(bytes).map_err(|_| FingerprintError::NotUtf8 {
    token: token.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLES: &[&str] = &[
    "",
    "in1",
    "data/raw/scan 01.nii.gz",
    "python analyse.py {inputs} {outputs}",
    "ünïcødé/路径/ファイル",
    "line\nbreak\tand tab",
  ];

  #[test]
  fn test_decode_inverts_encode() {
    for sample in SAMPLES {
      assert_eq!(decode(&encode(sample)).unwrap(), *sample);
    }
  }

  #[test]
  fn test_encode_is_stable_through_decode() {
    for sample in SAMPLES {
      let token = encode(sample);
      assert_eq!(encode(&decode(&token).unwrap()), token);
    }
  }

  #[test]
  fn test_distinct_inputs_give_distinct_tokens() {
    assert_ne!(encode("out1"), encode("out2"));
    assert_ne!(encode("a/b"), encode("a\\b"));
  }

  #[test]
  fn test_tokens_are_printable() {
    let token = encode("some/path with spaces?&=");
    assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
  }

  #[test]
  fn test_invalid_token_is_rejected() {
    assert!(matches!(
      decode("not a token!"),
      Err(FingerprintError::InvalidToken { .. })
    ));
  }

  #[test]
  fn test_non_utf8_payload_is_rejected() {
    let token = URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0xfd]);
    assert!(matches!(decode(&token), Err(FingerprintError::NotUtf8 { .. })));
  }
}

//! Wire format of encrypted field values and heuristics for recognising them.
//!
//! # Ciphertext format
//!
//! ```text
//! ENC1:<base64(iv || ciphertext || tag)>      current, tagged
//! <base64(iv || ciphertext || tag)>           legacy, untagged
//! ```
//!
//! Base64 uses the standard alphabet with padding. The legacy form carries no
//! marker and can only be recognised heuristically, so [`FormatDetector`] may
//! report plaintext that happens to look like base64 as encrypted.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Tag that opens every current-format encrypted value.
pub const TAG: &str = "ENC1";

/// Byte length of the AES-GCM initialisation vector (96 bits).
pub const IV_LEN: usize = 12;

/// Byte length of the AES-GCM authentication tag appended to the ciphertext.
pub const AUTH_TAG_LEN: usize = 16;

/// Untagged values must be strictly longer than this to be treated as legacy ciphertext.
pub const DEFAULT_LEGACY_MIN_LEN: usize = 16;

/// Errors from decoding an envelope payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The payload is not valid standard base64.
    #[error("payload is not valid base64")]
    InvalidBase64,

    /// The decoded payload cannot hold an IV and an authentication tag.
    #[error("payload too short: {0} bytes")]
    TooShort(usize),
}

/// Raw IV and ciphertext (with authentication tag) of one encrypted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    /// Initialisation vector bytes.
    pub iv: [u8; IV_LEN],
    /// Ciphertext with the authentication tag appended.
    pub ciphertext: Vec<u8>,
}

impl SealedPayload {
    /// Encode as the current tagged format: `ENC1:<base64>`.
    pub fn to_tagged_string(&self) -> String {
        format!("{TAG}:{}", self.to_base64())
    }

    /// Encode as bare base64 of `iv || ciphertext`, the legacy layout.
    pub fn to_base64(&self) -> String {
        let mut raw = Vec::with_capacity(IV_LEN + self.ciphertext.len());
        raw.extend_from_slice(&self.iv);
        raw.extend_from_slice(&self.ciphertext);
        STANDARD.encode(raw)
    }

    /// Decode a base64 payload (without any tag) into IV and ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidBase64`] if `payload` is not base64 and
    /// [`EnvelopeError::TooShort`] if it decodes to fewer than
    /// `IV_LEN + AUTH_TAG_LEN` bytes.
    pub fn from_base64(payload: &str) -> Result<Self, EnvelopeError> {
        let raw = STANDARD
            .decode(payload)
            .map_err(|_| EnvelopeError::InvalidBase64)?;
        if raw.len() < IV_LEN + AUTH_TAG_LEN {
            return Err(EnvelopeError::TooShort(raw.len()));
        }
        let (iv_bytes, ciphertext) = raw.split_at(IV_LEN);
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(iv_bytes);
        Ok(Self {
            iv,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Classification of a stored field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format<'a> {
    /// `ENC1:`-tagged; holds the base64 payload after the tag.
    Tagged(&'a str),
    /// Untagged but base64-shaped and long enough to be legacy ciphertext.
    Legacy(&'a str),
    /// Anything else, treated as plaintext.
    Plain,
}

impl Format<'_> {
    /// Returns `true` for both tagged and legacy values.
    pub fn is_encrypted(&self) -> bool {
        !matches!(self, Format::Plain)
    }
}

/// Decides whether a string value is ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDetector {
    legacy_detection: bool,
    legacy_min_len: usize,
}

impl FormatDetector {
    /// Create a detector. With `legacy_detection` off only tagged values count
    /// as encrypted.
    pub fn new(legacy_detection: bool, legacy_min_len: usize) -> Self {
        Self {
            legacy_detection,
            legacy_min_len,
        }
    }

    /// Classify `value` as tagged, legacy, or plain.
    pub fn classify<'a>(&self, value: &'a str) -> Format<'a> {
        if let Some(payload) = value
            .strip_prefix(TAG)
            .and_then(|rest| rest.strip_prefix(':'))
        {
            return Format::Tagged(payload);
        }
        if self.legacy_detection
            && value.len() > self.legacy_min_len
            && value.chars().all(is_base64_char)
        {
            return Format::Legacy(value);
        }
        Format::Plain
    }

    /// Returns `true` if `value` is tagged or looks like legacy ciphertext.
    pub fn is_encrypted(&self, value: &str) -> bool {
        self.classify(value).is_encrypted()
    }
}

impl Default for FormatDetector {
    fn default() -> Self {
        Self::new(true, DEFAULT_LEGACY_MIN_LEN)
    }
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> SealedPayload {
        SealedPayload {
            iv: [7u8; IV_LEN],
            ciphertext: vec![0xAB; AUTH_TAG_LEN + 5],
        }
    }

    #[test]
    fn tagged_string_has_prefix_and_decodes() {
        let payload = sample_payload();
        let s = payload.to_tagged_string();
        assert!(s.starts_with("ENC1:"));
        let body = s.strip_prefix("ENC1:").unwrap();
        assert_eq!(SealedPayload::from_base64(body).unwrap(), payload);
    }

    #[test]
    fn from_base64_rejects_garbage() {
        assert_eq!(
            SealedPayload::from_base64("not base64!!"),
            Err(EnvelopeError::InvalidBase64)
        );
    }

    #[test]
    fn from_base64_rejects_short_payload() {
        let short = STANDARD.encode([0u8; IV_LEN + AUTH_TAG_LEN - 1]);
        assert_eq!(
            SealedPayload::from_base64(&short),
            Err(EnvelopeError::TooShort(IV_LEN + AUTH_TAG_LEN - 1))
        );
    }

    #[test]
    fn tagged_value_is_always_encrypted() {
        let d = FormatDetector::default();
        assert!(matches!(d.classify("ENC1:abc"), Format::Tagged("abc")));
        assert!(FormatDetector::new(false, 16).is_encrypted("ENC1:x"));
    }

    #[test]
    fn legacy_requires_length_over_minimum() {
        let d = FormatDetector::default();
        // exactly 16 characters is not enough
        assert!(!d.is_encrypted("QUJDREVGR0hJSktM"));
        assert!(d.is_encrypted("QUJDREVGR0hJSktMTQ=="));
    }

    #[test]
    fn plaintext_with_spaces_or_punctuation_is_plain() {
        let d = FormatDetector::default();
        assert_eq!(d.classify("Jane Doe"), Format::Plain);
        assert_eq!(d.classify("12 Orchard Lane, Appleby"), Format::Plain);
        assert_eq!(d.classify("jane.doe@example.com"), Format::Plain);
        assert_eq!(d.classify(""), Format::Plain);
    }

    #[test]
    fn legacy_detection_can_be_disabled() {
        let d = FormatDetector::new(false, DEFAULT_LEGACY_MIN_LEN);
        let legacy = sample_payload().to_base64();
        assert_eq!(d.classify(&legacy), Format::Plain);
        assert!(FormatDetector::default().is_encrypted(&legacy));
    }

    #[test]
    fn wrong_tag_version_is_not_tagged() {
        let d = FormatDetector::default();
        assert_eq!(d.classify("ENC2:payload"), Format::Plain);
    }
}

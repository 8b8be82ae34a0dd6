//! Record-level helpers: encrypt or decrypt a named set of fields.
//!
//! A field name first addresses the top-level key of exactly that name, so
//! `"phone"` and a literal `"shipping.phone"` key both work as given. Only when
//! no such key exists is the name read as a dot-notation path:
//! `"shipping.phone"` navigates into a nested object, `"recipients[].email"`
//! expands over every element of an array, and `"parcels[][].email"` over
//! every element of every inner array. Absent fields and non-string values
//! are passed through untouched.

use common::{FieldCryptoError, Record};
use serde_json::Value;

use crate::field::FieldCipher;

/// Segments of a dot-notation field path.
#[derive(Debug, PartialEq, Eq)]
enum PathSegment {
    /// Navigate into an object property by name.
    Key(String),
    /// Expand into every element of a JSON array.
    ArrayItem,
}

/// Parse a dot-notation path into [`PathSegment`]s.
///
/// `"orders[].card_number"` → `[Key("orders"), ArrayItem, Key("card_number")]`.
fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut key = part;
        let mut depth = 0;
        while let Some(inner) = key.strip_suffix("[]") {
            key = inner;
            depth += 1;
        }
        segments.push(PathSegment::Key(key.to_owned()));
        for _ in 0..depth {
            segments.push(PathSegment::ArrayItem);
        }
    }
    segments
}

/// Collect every string leaf of `record` addressed by the field name `field`.
///
/// A top-level key equal to `field` wins over its path reading.
fn string_leaves<'r>(record: &'r mut Record, field: &str) -> Vec<&'r mut String> {
    let mut out = Vec::new();
    if record.contains_key(field) {
        if let Some(value) = record.get_mut(field) {
            collect(value, &[], &mut out);
        }
        return out;
    }
    let segments = parse_path(field);
    if let Some((PathSegment::Key(key), rest)) = segments.split_first() {
        if let Some(child) = record.get_mut(key) {
            collect(child, rest, &mut out);
        }
    }
    out
}

fn collect<'v>(value: &'v mut Value, segments: &[PathSegment], out: &mut Vec<&'v mut String>) {
    let Some((head, rest)) = segments.split_first() else {
        if let Value::String(s) = value {
            out.push(s);
        }
        return;
    };
    match head {
        PathSegment::Key(key) => {
            if let Value::Object(map) = value {
                if let Some(child) = map.get_mut(key) {
                    collect(child, rest, out);
                }
            }
        }
        PathSegment::ArrayItem => {
            if let Value::Array(items) = value {
                for item in items.iter_mut() {
                    collect(item, rest, out);
                }
            }
        }
    }
}

impl FieldCipher {
    /// Return a copy of `record` with the named fields encrypted.
    ///
    /// Values already reported encrypted are skipped, so applying this twice
    /// is the same as applying it once. A field whose encryption fails keeps
    /// its plaintext (see [`FieldCipher::encrypt`]).
    pub async fn encrypt_fields<S: AsRef<str>>(&self, record: &Record, fields: &[S]) -> Record {
        let mut out = record.clone();
        for field in fields {
            for leaf in string_leaves(&mut out, field.as_ref()) {
                if !self.is_encrypted(leaf) {
                    *leaf = self.encrypt(leaf).await;
                }
            }
        }
        out
    }

    /// Like [`FieldCipher::encrypt_fields`] but fails on the first field that
    /// cannot be encrypted.
    ///
    /// # Errors
    ///
    /// Propagates the error of [`FieldCipher::try_encrypt`].
    pub async fn try_encrypt_fields<S: AsRef<str>>(
        &self,
        record: &Record,
        fields: &[S],
    ) -> Result<Record, FieldCryptoError> {
        let mut out = record.clone();
        for field in fields {
            for leaf in string_leaves(&mut out, field.as_ref()) {
                if !self.is_encrypted(leaf) {
                    *leaf = self.try_encrypt(leaf).await?;
                }
            }
        }
        Ok(out)
    }

    /// Return a copy of `record` with the named encrypted fields decrypted.
    ///
    /// Plain values pass through; values that fail to decrypt are kept as stored.
    pub async fn decrypt_fields<S: AsRef<str>>(&self, record: &Record, fields: &[S]) -> Record {
        let mut out = record.clone();
        for field in fields {
            for leaf in string_leaves(&mut out, field.as_ref()) {
                if self.is_encrypted(leaf) {
                    *leaf = self.decrypt(leaf).await;
                }
            }
        }
        out
    }

    /// Like [`FieldCipher::decrypt_fields`] but fails on the first field that
    /// cannot be decrypted.
    ///
    /// # Errors
    ///
    /// Propagates the error of [`FieldCipher::try_decrypt`].
    pub async fn try_decrypt_fields<S: AsRef<str>>(
        &self,
        record: &Record,
        fields: &[S],
    ) -> Result<Record, FieldCryptoError> {
        let mut out = record.clone();
        for field in fields {
            for leaf in string_leaves(&mut out, field.as_ref()) {
                if self.is_encrypted(leaf) {
                    *leaf = self.try_decrypt(leaf).await?;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::tests::test_cipher;
    use serde_json::json;

    fn record(v: Value) -> Record {
        match v {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn parse_path_flat() {
        assert_eq!(parse_path("ssn"), vec![PathSegment::Key("ssn".into())]);
    }

    #[test]
    fn parse_path_nested_and_array() {
        assert_eq!(parse_path("user.address.zip").len(), 3);
        let segs = parse_path("orders[].card_number");
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[1], PathSegment::ArrayItem);
    }

    #[test]
    fn parse_path_nested_arrays() {
        assert_eq!(
            parse_path("parcels[][].email"),
            vec![
                PathSegment::Key("parcels".into()),
                PathSegment::ArrayItem,
                PathSegment::ArrayItem,
                PathSegment::Key("email".into()),
            ]
        );
    }

    #[tokio::test]
    async fn only_named_fields_are_encrypted() {
        let c = test_cipher();
        let input = record(json!({"name": "Ann", "age": 30}));
        let out = c.encrypt_fields(&input, &["name"]).await;

        assert!(out["name"].as_str().unwrap().starts_with("ENC1:"));
        assert_eq!(out["age"], json!(30));
        assert_eq!(input["name"], json!("Ann"), "input must not be modified");
    }

    #[tokio::test]
    async fn key_set_is_preserved() {
        let c = test_cipher();
        let input = record(json!({"name": "Ann", "email": "ann@example.com", "note": null}));
        let out = c.encrypt_fields(&input, &["name", "email", "note", "missing"]).await;

        let mut before: Vec<_> = input.keys().collect();
        let mut after: Vec<_> = out.keys().collect();
        before.sort();
        after.sort();
        assert_eq!(before, after);
        assert_eq!(out["note"], Value::Null);
    }

    #[tokio::test]
    async fn encrypt_fields_is_idempotent() {
        let c = test_cipher();
        let input = record(json!({"name": "Jane Doe", "phone": "+44 7700 900123"}));
        let fields = ["name", "phone"];
        let once = c.encrypt_fields(&input, &fields).await;
        let twice = c.encrypt_fields(&once, &fields).await;
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn decrypt_fields_restores_record() {
        let c = test_cipher();
        let input = record(json!({
            "name": "Jane Doe",
            "address": "12 Orchard Lane",
            "phone": "",
            "total": 42.5
        }));
        let fields = ["name", "address", "phone"];
        let sealed = c.encrypt_fields(&input, &fields).await;
        assert_eq!(sealed["phone"], json!(""));
        let opened = c.decrypt_fields(&sealed, &fields).await;
        assert_eq!(opened, input);
    }

    #[tokio::test]
    async fn decrypt_fields_passes_plain_values_through() {
        let c = test_cipher();
        let input = record(json!({"name": "Jane Doe"}));
        assert_eq!(c.decrypt_fields(&input, &["name"]).await, input);
        assert_eq!(c.try_decrypt_fields(&input, &["name"]).await.unwrap(), input);
    }

    #[tokio::test]
    async fn nested_and_array_paths() {
        let c = test_cipher();
        let input = record(json!({
            "shipping": {"name": "Jane Doe", "city": "Appleby"},
            "recipients": [{"email": "a@example.com"}, {"email": "b@example.com"}, {"email": 7}]
        }));
        let fields = ["shipping.name", "recipients[].email"];
        let sealed = c.try_encrypt_fields(&input, &fields).await.unwrap();

        assert!(sealed["shipping"]["name"].as_str().unwrap().starts_with("ENC1:"));
        assert_eq!(sealed["shipping"]["city"], json!("Appleby"));
        assert!(sealed["recipients"][0]["email"].as_str().unwrap().starts_with("ENC1:"));
        assert!(sealed["recipients"][1]["email"].as_str().unwrap().starts_with("ENC1:"));
        assert_eq!(sealed["recipients"][2]["email"], json!(7));

        let opened = c.try_decrypt_fields(&sealed, &fields).await.unwrap();
        assert_eq!(opened, input);
    }

    #[tokio::test]
    async fn try_decrypt_fields_reports_corruption() {
        let c = test_cipher();
        let input = record(json!({"name": "ENC1:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"}));
        assert!(c.try_decrypt_fields(&input, &["name"]).await.is_err());
        assert_eq!(c.decrypt_fields(&input, &["name"]).await, input);
    }

    #[tokio::test]
    async fn literal_dotted_key_is_addressed() {
        let c = test_cipher();
        let input = record(json!({"shipping.phone": "+44 7700 900123", "items[]": "seeds"}));
        let fields = ["shipping.phone", "items[]"];
        let sealed = c.encrypt_fields(&input, &fields).await;

        assert!(sealed["shipping.phone"].as_str().unwrap().starts_with("ENC1:"));
        assert!(sealed["items[]"].as_str().unwrap().starts_with("ENC1:"));
        assert_eq!(c.decrypt_fields(&sealed, &fields).await, input);
    }

    #[tokio::test]
    async fn literal_key_wins_over_nested_path() {
        let c = test_cipher();
        let input = record(json!({
            "shipping.phone": "+44 7700 900123",
            "shipping": {"phone": "+44 7700 900999"}
        }));
        let sealed = c.encrypt_fields(&input, &["shipping.phone"]).await;

        assert!(sealed["shipping.phone"].as_str().unwrap().starts_with("ENC1:"));
        assert_eq!(sealed["shipping"]["phone"], json!("+44 7700 900999"));
    }

    #[tokio::test]
    async fn array_of_arrays_is_expanded() {
        let c = test_cipher();
        let input = record(json!({
            "parcels": [[{"email": "jane@example.com"}], [{"email": "sam@example.com"}, {"email": null}]]
        }));
        let sealed = c.encrypt_fields(&input, &["parcels[][].email"]).await;

        assert!(sealed["parcels"][0][0]["email"].as_str().unwrap().starts_with("ENC1:"));
        assert!(sealed["parcels"][1][0]["email"].as_str().unwrap().starts_with("ENC1:"));
        assert_eq!(sealed["parcels"][1][1]["email"], json!(null));
        assert_eq!(c.decrypt_fields(&sealed, &["parcels[][].email"]).await, input);
    }
}

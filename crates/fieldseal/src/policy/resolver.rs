//! PII field path resolution from OpenAPI documents.
//!
//! Every schema under `components/schemas` is walked for properties annotated
//! `x-pii: true`. A schema contributes to the collection named by its
//! `x-collection` extension, or to the document's default collection when
//! the extension is absent.
//!
//! Local references (`#/components/schemas/<Name>`) are followed, so
//! `shipping: {$ref: Address}` yields `shipping.<field>` paths. A schema that
//! another schema references is treated as an embedded type, not a record of
//! its own, unless it names an `x-collection`. A recursive reference is
//! expanded once. External references and `allOf`/`oneOf`/`anyOf`
//! compositions are not followed.

use std::collections::{BTreeSet, HashMap, HashSet};

use openapiv3::{Components, OpenAPI, ReferenceOr, Schema, SchemaKind, Type};

const LOCAL_SCHEMA_PREFIX: &str = "#/components/schemas/";

/// Dot-notation paths of the fields to encrypt in one collection.
///
/// Example paths: `"name"`, `"shipping.phone"`, `"recipients[].email"`.
pub type FieldPaths = BTreeSet<String>;

/// Resolve `x-pii` paths in `api`, grouped by collection.
///
/// Collections without any PII field are omitted.
pub fn resolve_collections(api: &OpenAPI, default_collection: &str) -> HashMap<String, FieldPaths> {
    let mut out: HashMap<String, FieldPaths> = HashMap::new();

    let Some(components) = &api.components else {
        return out;
    };
    let embedded = embedded_schemas(components);

    for (name, schema_ref) in &components.schemas {
        let ReferenceOr::Item(schema) = schema_ref else {
            continue;
        };
        let collection = schema
            .schema_data
            .extensions
            .get("x-collection")
            .and_then(|v| v.as_str());
        if collection.is_none() && embedded.contains(name.as_str()) {
            continue;
        }
        let paths = out
            .entry(collection.unwrap_or(default_collection).to_owned())
            .or_default();
        let mut walker = Walker {
            components,
            expanding: vec![name.as_str()],
        };
        walker.walk(schema, "", paths);
    }

    out.retain(|_, paths| !paths.is_empty());
    out
}

fn is_pii(schema: &Schema) -> bool {
    schema
        .schema_data
        .extensions
        .get("x-pii")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn local_name(reference: &str) -> Option<&str> {
    reference.strip_prefix(LOCAL_SCHEMA_PREFIX)
}

/// Names of component schemas referenced by some other component schema.
fn embedded_schemas(components: &Components) -> HashSet<&str> {
    let mut embedded = HashSet::new();
    for (name, schema_ref) in &components.schemas {
        if let ReferenceOr::Item(schema) = schema_ref {
            let mut refs = HashSet::new();
            collect_refs(schema, &mut refs);
            refs.remove(name.as_str());
            embedded.extend(refs);
        }
    }
    embedded
}

fn collect_refs<'a>(schema: &'a Schema, refs: &mut HashSet<&'a str>) {
    match &schema.schema_kind {
        SchemaKind::Type(Type::Object(obj)) => {
            for prop_ref in obj.properties.values() {
                note_ref(prop_ref, refs);
            }
        }
        SchemaKind::Type(Type::Array(arr)) => {
            if let Some(items) = &arr.items {
                note_ref(items, refs);
            }
        }
        _ => {}
    }
}

fn note_ref<'a>(schema_ref: &'a ReferenceOr<Box<Schema>>, refs: &mut HashSet<&'a str>) {
    match schema_ref {
        ReferenceOr::Reference { reference } => {
            if let Some(name) = local_name(reference) {
                refs.insert(name);
            }
        }
        ReferenceOr::Item(schema) => collect_refs(schema, refs),
    }
}

/// Depth-first walk of one record schema.
struct Walker<'a> {
    components: &'a Components,
    /// Referenced schemas currently being expanded, to stop on recursion.
    expanding: Vec<&'a str>,
}

impl<'a> Walker<'a> {
    /// Resolve an inline schema or a local reference to its schema and, for
    /// references, the referenced name.
    fn resolve(&self, schema_ref: &'a ReferenceOr<Box<Schema>>) -> Option<(Option<&'a str>, &'a Schema)> {
        match schema_ref {
            ReferenceOr::Item(schema) => Some((None, &**schema)),
            ReferenceOr::Reference { reference } => {
                let name = local_name(reference)?;
                match self.components.schemas.get(name)? {
                    ReferenceOr::Item(schema) => Some((Some(name), schema)),
                    ReferenceOr::Reference { .. } => None,
                }
            }
        }
    }

    /// Append PII paths of `schema` under `prefix` to `out`.
    fn walk(&mut self, schema: &'a Schema, prefix: &str, out: &mut FieldPaths) {
        match &schema.schema_kind {
            SchemaKind::Type(Type::Object(obj)) => {
                for (prop_name, prop_ref) in &obj.properties {
                    let Some((ref_name, prop)) = self.resolve(prop_ref) else {
                        continue;
                    };
                    let path = if prefix.is_empty() {
                        prop_name.clone()
                    } else {
                        format!("{prefix}.{prop_name}")
                    };
                    if is_pii(prop) {
                        out.insert(path.clone());
                    }
                    self.descend(ref_name, prop, &path, out);
                }
            }
            SchemaKind::Type(Type::Array(arr)) => {
                // A top-level array has no field name to hang `[]` on.
                if prefix.is_empty() {
                    return;
                }
                if let Some(items_ref) = &arr.items {
                    if let Some((ref_name, items)) = self.resolve(items_ref) {
                        self.descend(ref_name, items, &format!("{prefix}[]"), out);
                    }
                }
            }
            _ => {}
        }
    }

    fn descend(&mut self, ref_name: Option<&'a str>, schema: &'a Schema, path: &str, out: &mut FieldPaths) {
        match ref_name {
            None => self.walk(schema, path, out),
            Some(name) if self.expanding.contains(&name) => {}
            Some(name) => {
                self.expanding.push(name);
                self.walk(schema, path, out);
                self.expanding.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_api(yaml: &str) -> OpenAPI {
        serde_yaml::from_str(yaml).expect("valid YAML")
    }

    const ORDERS: &str = r#"
openapi: "3.0.0"
info:
  title: orders
  version: "1"
paths: {}
components:
  schemas:
    Order:
      type: object
      properties:
        total:
          type: number
        shipping:
          type: object
          properties:
            name:
              type: string
              x-pii: true
            phone:
              type: string
              x-pii: true
            city:
              type: string
        gift_recipients:
          type: array
          items:
            type: object
            properties:
              email:
                type: string
                x-pii: true
              message:
                type: string
"#;

    #[test]
    fn nested_and_array_paths_resolved() {
        let collections = resolve_collections(&parse_api(ORDERS), "orders");
        let paths = &collections["orders"];
        let expected: FieldPaths = ["gift_recipients[].email", "shipping.name", "shipping.phone"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(paths, &expected);
    }

    #[test]
    fn x_collection_routes_schema() {
        let yaml = r#"
openapi: "3.0.0"
info:
  title: shop
  version: "1"
paths: {}
components:
  schemas:
    Profile:
      type: object
      x-collection: profiles
      properties:
        email:
          type: string
          x-pii: true
        locale:
          type: string
    Product:
      type: object
      properties:
        title:
          type: string
"#;
        let collections = resolve_collections(&parse_api(yaml), "shop");
        assert!(collections["profiles"].contains("email"));
        assert!(!collections["profiles"].contains("locale"));
        assert!(!collections.contains_key("shop"));
    }

    #[test]
    fn no_components_returns_empty() {
        let yaml = r#"
openapi: "3.0.0"
info:
  title: test
  version: "1"
paths: {}
"#;
        assert!(resolve_collections(&parse_api(yaml), "x").is_empty());
    }

    #[test]
    fn document_without_pii_yields_nothing() {
        let yaml = r#"
openapi: "3.0.0"
info:
  title: catalog
  version: "1"
paths: {}
components:
  schemas:
    Product:
      type: object
      properties:
        title:
          type: string
"#;
        assert!(resolve_collections(&parse_api(yaml), "products").is_empty());
    }

    #[test]
    fn local_refs_are_followed_and_not_rooted() {
        let yaml = r##"
openapi: "3.0.0"
info:
  title: orders
  version: "1"
paths: {}
components:
  schemas:
    Order:
      type: object
      properties:
        shipping:
          $ref: "#/components/schemas/Address"
        parcels:
          type: array
          items:
            $ref: "#/components/schemas/Parcel"
    Address:
      type: object
      properties:
        name:
          type: string
          x-pii: true
        city:
          type: string
    Parcel:
      type: object
      properties:
        recipient:
          $ref: "#/components/schemas/Address"
"##;
        let collections = resolve_collections(&parse_api(yaml), "orders");
        let expected: FieldPaths = ["parcels[].recipient.name", "shipping.name"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(collections["orders"], expected);
    }

    #[test]
    fn recursive_ref_is_expanded_once() {
        let yaml = r##"
openapi: "3.0.0"
info:
  title: referrals
  version: "1"
paths: {}
components:
  schemas:
    Customer:
      type: object
      properties:
        email:
          type: string
          x-pii: true
        referrer:
          $ref: "#/components/schemas/Referral"
    Referral:
      type: object
      properties:
        phone:
          type: string
          x-pii: true
        referred_by:
          $ref: "#/components/schemas/Referral"
"##;
        let collections = resolve_collections(&parse_api(yaml), "customers");
        let expected: FieldPaths = ["email", "referrer.phone"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(collections["customers"], expected);
    }

    #[tokio::test]
    async fn nested_array_paths_seal_records() {
        let yaml = r#"
openapi: "3.0.0"
info:
  title: shipments
  version: "1"
paths: {}
components:
  schemas:
    Shipment:
      type: object
      properties:
        parcels:
          type: array
          items:
            type: array
            items:
              type: object
              properties:
                email:
                  type: string
                  x-pii: true
"#;
        let collections = resolve_collections(&parse_api(yaml), "shipments");
        let paths: Vec<&str> = collections["shipments"].iter().map(String::as_str).collect();
        assert_eq!(paths, vec!["parcels[][].email"]);

        let cipher = crate::field::tests::test_cipher();
        let record = match serde_json::json!({"parcels": [[{"email": "jane@example.com"}]]}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let sealed = cipher.encrypt_fields(&record, &paths).await;
        let email = sealed["parcels"][0][0]["email"].as_str().unwrap();
        assert!(email.starts_with("ENC1:"));
        assert_eq!(cipher.decrypt_fields(&sealed, &paths).await, record);
    }
}

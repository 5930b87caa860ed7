//! Resource types built from OpenAPI-v3 documents.

use crate::error::SchemaError;
use crate::property::Property;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The subject prefix used in where clauses (`subject.sub`, …)
pub const SUBJECT: &str = "subject";

/// Catalogue key of the subject pseudo-type
pub const SUBJECT_TYPE: &str = "unknown.subject";

const SEAL_TYPE_ACTION: &str = "action";
const SEAL_TYPE_NONE: &str = "none";
const SEAL_TYPE_DEFAULT: &str = "type";

/// A catalogued resource type: `group.name`, its verbs, actions and
/// properties.
///
/// The verb table keeps its keys sorted and the final type list is sorted by
/// `group.name`, so generated output is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceType {
    group: String,
    name: String,
    verbs: IndexMap<String, Vec<String>>,
    actions: BTreeSet<String>,
    default_action: String,
    properties: BTreeMap<String, Property>,
    raw: Value,
}

impl ResourceType {
    /// Group component
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Name component
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Verb table, sorted by verb name, each verb mapping to its base verbs
    #[must_use]
    pub fn verbs(&self) -> &IndexMap<String, Vec<String>> {
        &self.verbs
    }

    /// Declared action names
    #[must_use]
    pub fn actions(&self) -> &BTreeSet<String> {
        &self.actions
    }

    /// Default action name; empty for pseudo-types
    #[must_use]
    pub fn default_action(&self) -> &str {
        &self.default_action
    }

    /// Properties by name
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, Property> {
        &self.properties
    }

    /// Look up a property by name
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Raw schema value this type was built from
    #[must_use]
    pub fn raw_schema(&self) -> &Value {
        &self.raw
    }

    /// Whether `verb` is declared for this type
    #[must_use]
    pub fn is_valid_verb(&self, verb: &str) -> bool {
        self.verbs.contains_key(verb)
    }

    /// Whether `action` is declared for this type
    #[must_use]
    pub fn is_valid_action(&self, action: &str) -> bool {
        self.actions.contains(action)
    }

    /// Whether `reference` names a property of this type as `ctx.<name>`
    #[must_use]
    pub fn is_valid_property(&self, reference: &str) -> bool {
        self.properties
            .keys()
            .any(|name| reference == format!("ctx.{}", name))
    }

    /// Whether `reference` indexes a tag-map property as `ctx.<name>["…"]`
    #[must_use]
    pub fn is_valid_tag(&self, reference: &str) -> bool {
        self.properties.values().any(|prop| {
            prop.has_additional_properties()
                && reference.starts_with(&format!("ctx.{}[\"", prop.name()))
        })
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// Whether `reference` names a property of the subject pseudo-type as
/// `subject.<name>`.
#[must_use]
pub fn is_valid_subject(types: &BTreeMap<String, ResourceType>, reference: &str) -> bool {
    if !reference.starts_with(SUBJECT) {
        return false;
    }
    let Some(subject) = types.get(SUBJECT_TYPE) else {
        return false;
    };
    subject
        .properties()
        .keys()
        .any(|name| reference == format!("{}.{}", SUBJECT, name))
}

/// Build the sorted type catalogue from a single OpenAPI document.
///
/// # Errors
///
/// Returns an error for unparsable documents, documents without schemas, and
/// structurally invalid schema entries. No partial catalogue is returned.
pub fn types_from_openapi(spec: &str) -> Result<Vec<ResourceType>, SchemaError> {
    build_types(&parse_document(spec)?)
}

/// Build the sorted type catalogue from several OpenAPI documents, merged
/// last-wins by schema key.
///
/// # Errors
///
/// Same failure modes as [`types_from_openapi`].
pub fn types_from_openapi_docs(specs: &[&str]) -> Result<Vec<ResourceType>, SchemaError> {
    build_types(&merge_openapi(specs)?)
}

/// Merge the `components.schemas` maps of several documents.
///
/// Later documents silently override earlier ones per schema key.
///
/// # Errors
///
/// Returns an error when a document fails to parse.
pub fn merge_openapi(specs: &[&str]) -> Result<IndexMap<String, Value>, SchemaError> {
    let mut merged = IndexMap::new();
    for spec in specs {
        merged.extend(parse_document(spec)?);
    }
    Ok(merged)
}

fn parse_document(spec: &str) -> Result<IndexMap<String, Value>, SchemaError> {
    let doc: Value =
        serde_yaml::from_str(spec).map_err(|err| SchemaError::Load(err.to_string()))?;

    let mut schemas = IndexMap::new();
    if let Some(mapping) = doc
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_mapping)
    {
        for (key, value) in mapping {
            if let Some(name) = key.as_str() {
                schemas.insert(name.to_string(), value.clone());
            }
        }
    }
    Ok(schemas)
}

fn build_types(schemas: &IndexMap<String, Value>) -> Result<Vec<ResourceType>, SchemaError> {
    if schemas.is_empty() {
        return Err(SchemaError::NoSchemas);
    }

    let mut types = Vec::new();
    for (key, value) in schemas {
        let raw: RawSchema =
            serde_yaml::from_value(value.clone()).map_err(|err| SchemaError::InvalidModel {
                name: key.clone(),
                message: err.to_string(),
            })?;

        let seal_type = raw.seal_type.as_deref().unwrap_or(SEAL_TYPE_DEFAULT);
        match seal_type {
            SEAL_TYPE_DEFAULT | SEAL_TYPE_NONE => {}
            // action schemas and unknown kinds are not resource types
            _ => continue,
        }

        let properties = build_properties(key, &raw, schemas)?;

        if seal_type != SEAL_TYPE_NONE {
            if raw.seal_actions.as_deref().unwrap_or_default().is_empty() {
                return Err(SchemaError::NoActions { name: key.clone() });
            }
            if raw.seal_verbs.as_ref().map_or(true, |verbs| verbs.is_empty()) {
                return Err(SchemaError::NoVerbs { name: key.clone() });
            }
            if raw
                .seal_default_action
                .as_deref()
                .unwrap_or_default()
                .is_empty()
            {
                return Err(SchemaError::NoDefaultAction { name: key.clone() });
            }
        }

        let (group, name) = match key.split_once('.') {
            Some((group, name)) => (group.to_string(), name.to_string()),
            None => ("unknown".to_string(), key.clone()),
        };

        let mut verb_names: Vec<&String> =
            raw.seal_verbs.iter().flat_map(|m| m.keys()).collect();
        verb_names.sort();
        let mut verbs = IndexMap::new();
        for verb in verb_names {
            let base = raw
                .seal_verbs
                .as_ref()
                .and_then(|m| m.get(verb))
                .cloned()
                .flatten()
                .unwrap_or_default();
            verbs.insert(verb.clone(), base);
        }

        let actions: BTreeSet<String> = raw
            .seal_actions
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect();

        tracing::trace!(
            type_key = %key,
            verbs = verbs.len(),
            properties = properties.len(),
            "catalogued resource type"
        );

        types.push(ResourceType {
            group,
            name,
            verbs,
            actions,
            default_action: raw.seal_default_action.clone().unwrap_or_default(),
            properties,
            raw: value.clone(),
        });
    }

    if types.is_empty() {
        return Err(SchemaError::NoSchemas);
    }
    types.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    Ok(types)
}

fn build_properties(
    type_key: &str,
    raw: &RawSchema,
    schemas: &IndexMap<String, Value>,
) -> Result<BTreeMap<String, Property>, SchemaError> {
    let mut properties = BTreeMap::new();

    for (name, raw_prop) in raw.properties.iter().flatten() {
        let mut allows_additional = value_is_true(raw_prop.additional_properties.as_ref());
        let mut extensions = BTreeMap::new();

        // A $ref property resolves against the merged document; the target's
        // additionalProperties and extensions apply to the property.
        if let Some(reference) = &raw_prop.reference {
            if let Some(target) = reference
                .strip_prefix("#/components/schemas/")
                .and_then(|name| schemas.get(name))
            {
                if value_is_true(target.get("additionalProperties")) {
                    allows_additional = true;
                }
                collect_extensions(target.as_mapping(), &mut extensions);
            }
        }

        for (key, value) in &raw_prop.extra {
            if key.starts_with("x-") {
                if let Some(text) = scalar_to_string(value) {
                    extensions.insert(key.clone(), text);
                }
            }
        }

        let mut prop = Property::new(name.clone()).with_additional_properties(allows_additional);
        for (key, value) in extensions {
            prop = prop.with_extension(key, value);
        }
        properties.insert(name.clone(), prop);
    }

    if properties.is_empty() && !value_is_true(raw.additional_properties.as_ref()) {
        return Err(SchemaError::NoProperties {
            name: type_key.to_string(),
        });
    }
    Ok(properties)
}

fn collect_extensions(
    mapping: Option<&serde_yaml::Mapping>,
    extensions: &mut BTreeMap<String, String>,
) {
    for (key, value) in mapping.into_iter().flatten() {
        if let (Some(key), Some(text)) = (key.as_str(), scalar_to_string(value)) {
            if key.starts_with("x-") {
                extensions.insert(key.to_string(), text);
            }
        }
    }
}

fn value_is_true(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawSchema {
    #[serde(default)]
    properties: Option<IndexMap<String, RawProperty>>,
    #[serde(default, rename = "additionalProperties")]
    additional_properties: Option<Value>,
    #[serde(default, rename = "x-seal-type")]
    seal_type: Option<String>,
    #[serde(default, rename = "x-seal-actions")]
    seal_actions: Option<Vec<String>>,
    #[serde(default, rename = "x-seal-verbs")]
    seal_verbs: Option<IndexMap<String, Option<Vec<String>>>>,
    #[serde(default, rename = "x-seal-default-action")]
    seal_default_action: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProperty {
    #[serde(default, rename = "$ref")]
    reference: Option<String>,
    #[serde(default, rename = "additionalProperties")]
    additional_properties: Option<Value>,
    #[serde(flatten)]
    extra: IndexMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PETSTORE: &str = r#"
openapi: "3.0.0"
components:
  schemas:
    allow:
      type: object
      properties:
        log:
          type: boolean
      x-seal-type: action
    petstore.pet:
      type: object
      properties:
        id:
          type: string
        name:
          type: string
      x-seal-actions:
      - allow
      - deny
      x-seal-verbs:
        inspect: [ "list", "watch" ]
        use: [ "update", "get" ]
        manage: [ "create", "delete" ]
        emptyvrb: []
      x-seal-default-action: deny
"#;

    const GLOBAL: &str = r#"
openapi: "3.0.0"
components:
  schemas:
    subject:
      type: object
      properties:
        iss:
          type: string
        sub:
          type: string
        aud:
          type: string
        exp:
          type: integer
          format: int32
      x-seal-type: none
"#;

    const TAGS: &str = r#"
openapi: "3.0.0"
components:
  schemas:
    tag:
      type: object
      additionalProperties: true
      x-seal-type: none
"#;

    const WITH_TAG: &str = r#"
openapi: "3.0.0"
components:
  schemas:
    allow:
      type: object
      properties:
        log:
          type: boolean
      x-seal-type: action
    petstore.pet:
      type: object
      properties:
        id:
          type: string
        tags:
          $ref: '#/components/schemas/tag'
        color:
          type: string
          x-seal-obligation: true
      x-seal-actions:
      - allow
      x-seal-verbs:
        manage: [ "create", "delete" ]
      x-seal-default-action: deny
"#;

    #[test]
    fn test_types_from_openapi() {
        let types = types_from_openapi(PETSTORE).unwrap();
        assert_eq!(types.len(), 1);

        let pet = &types[0];
        assert_eq!(pet.to_string(), "petstore.pet");
        assert_eq!(pet.group(), "petstore");
        assert_eq!(pet.name(), "pet");
        assert_eq!(pet.default_action(), "deny");
        assert!(pet.is_valid_action("allow"));
        assert!(pet.is_valid_action("deny"));
        assert!(!pet.is_valid_action("audit"));
        assert!(pet.is_valid_verb("manage"));
        assert!(!pet.is_valid_verb("resolve"));
        assert!(pet.is_valid_property("ctx.id"));
        assert!(!pet.is_valid_property("ctx.missing"));
    }

    #[test]
    fn test_verbs_are_sorted_and_keep_base_verbs() {
        let types = types_from_openapi(PETSTORE).unwrap();
        let verbs: Vec<&str> = types[0].verbs().keys().map(String::as_str).collect();
        assert_eq!(verbs, vec!["emptyvrb", "inspect", "manage", "use"]);
        assert_eq!(types[0].verbs()["inspect"], vec!["list", "watch"]);
        assert!(types[0].verbs()["emptyvrb"].is_empty());
    }

    #[test]
    fn test_subject_pseudo_type() {
        let types = types_from_openapi(GLOBAL).unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].to_string(), SUBJECT_TYPE);
        assert_eq!(types[0].default_action(), "");

        let map: BTreeMap<String, ResourceType> = types
            .into_iter()
            .map(|t| (t.to_string(), t))
            .collect();
        assert!(is_valid_subject(&map, "subject.sub"));
        assert!(is_valid_subject(&map, "subject.exp"));
        assert!(!is_valid_subject(&map, "subject.nbf"));
        assert!(!is_valid_subject(&map, "ctx.sub"));
    }

    #[test]
    fn test_tag_map_via_ref_and_obligation_extension() {
        let types = types_from_openapi_docs(&[TAGS, WITH_TAG]).unwrap();
        let pet = types
            .iter()
            .find(|t| t.to_string() == "petstore.pet")
            .unwrap();

        let tags = pet.property("tags").unwrap();
        assert!(tags.has_additional_properties());
        assert!(pet.is_valid_tag("ctx.tags[\"department\"]"));
        assert!(!pet.is_valid_tag("ctx.id[\"department\"]"));

        let color = pet.property("color").unwrap();
        assert_eq!(color.extension("x-seal-obligation"), Some("true"));
    }

    #[test]
    fn test_merge_is_last_wins() {
        let first = r#"
components:
  schemas:
    petstore.pet:
      type: object
      properties:
        id:
          type: string
        legacy:
          type: string
      x-seal-actions: [ allow ]
      x-seal-verbs:
        manage: [ "create" ]
      x-seal-default-action: deny
"#;
        let second = r#"
components:
  schemas:
    petstore.pet:
      type: object
      properties:
        id:
          type: string
      x-seal-actions: [ allow ]
      x-seal-verbs:
        manage: [ "create" ]
      x-seal-default-action: deny
"#;
        let types = types_from_openapi_docs(&[first, second]).unwrap();
        assert_eq!(types.len(), 1);
        assert!(types[0].property("legacy").is_none());

        let types = types_from_openapi_docs(&[second, first]).unwrap();
        assert!(types[0].property("legacy").is_some());
    }

    #[test]
    fn test_blank_document_has_no_schemas() {
        assert_eq!(types_from_openapi(" "), Err(SchemaError::NoSchemas));
        assert_eq!(
            types_from_openapi("openapi: \"3.0.0\"\ncomponents:\n  schemas:"),
            Err(SchemaError::NoSchemas)
        );
    }

    #[test]
    fn test_missing_required_extensions() {
        let no_verbs = r#"
components:
  schemas:
    a.b:
      type: object
      properties:
        id:
          type: string
      x-seal-actions: [ allow ]
      x-seal-default-action: deny
"#;
        assert_eq!(
            types_from_openapi(no_verbs),
            Err(SchemaError::NoVerbs {
                name: "a.b".to_string()
            })
        );

        let no_props = r#"
components:
  schemas:
    a.b:
      type: object
      x-seal-actions: [ allow ]
      x-seal-verbs:
        manage: [ "create" ]
      x-seal-default-action: deny
"#;
        assert_eq!(
            types_from_openapi(no_props),
            Err(SchemaError::NoProperties {
                name: "a.b".to_string()
            })
        );
    }

    #[test]
    fn test_types_are_sorted() {
        let doc = r#"
components:
  schemas:
    zoo.keeper:
      type: object
      properties:
        id: { type: string }
      x-seal-actions: [ allow ]
      x-seal-verbs:
        manage: [ "create" ]
      x-seal-default-action: deny
    acme.widget:
      type: object
      properties:
        id: { type: string }
      x-seal-actions: [ allow ]
      x-seal-verbs:
        manage: [ "create" ]
      x-seal-default-action: deny
"#;
        let types = types_from_openapi(doc).unwrap();
        let keys: Vec<String> = types.iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["acme.widget", "zoo.keeper"]);
    }
}

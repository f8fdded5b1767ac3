use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, StoreError};

pub const DATA_DAO_TYPE: &str = "dataDAO";
pub const TOKEN_TYPE: &str = "token";

fn reference_kind() -> String {
    "reference".to_string()
}

fn image_kind() -> String {
    "image".to_string()
}

/// A strong reference from one document to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "_type", default = "reference_kind")]
    pub kind: String,
    #[serde(rename = "_ref")]
    pub target: String,
}

impl Reference {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            kind: reference_kind(),
            target: target.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "_type": self.kind, "_ref": self.target })
    }
}

/// Image field value pointing at an uploaded asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(rename = "_type", default = "image_kind")]
    pub kind: String,
    pub asset: Reference,
}

impl ImageRef {
    pub fn for_asset(asset_id: impl Into<String>) -> Self {
        Self {
            kind: image_kind(),
            asset: Reference::to(asset_id),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "_type": self.kind, "asset": self.asset.to_value() })
    }
}

/// The asset document returned by an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDocument {
    #[serde(rename = "_id")]
    pub document_id: String,
    #[serde(default)]
    pub token_contract: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "associatedDataDAO", default, skip_serializing_if = "Option::is_none")]
    pub associated_data_dao: Option<Reference>,
}

impl TokenDocument {
    pub fn fields(&self) -> Map<String, Value> {
        as_field_map(self)
    }
}

fn as_field_map<T: Serialize>(document: &T) -> Map<String, Value> {
    match serde_json::to_value(document) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// True when a stored field holds nothing a human could have typed in.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Bool(_)) | Some(Value::Number(_)) => false,
    }
}

/// Field assignments for a single document, keyed by stored field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriteSet(BTreeMap<String, Value>);

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Later assignments win.
    pub fn extend(&mut self, other: WriteSet) {
        self.0.extend(other.0);
    }

    /// Drops every assignment whose value already matches `existing`.
    pub fn prune_unchanged(&mut self, existing: &Map<String, Value>) {
        self.0
            .retain(|field, value| existing.get(field.as_str()) != Some(&*value));
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0.into_iter().collect()
    }
}

impl FromIterator<(String, Value)> for WriteSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    pub set: WriteSet,
    pub unset: Vec<String>,
}

impl Patch {
    pub fn set(fields: WriteSet) -> Self {
        Self {
            set: fields,
            unset: Vec::new(),
        }
    }

    pub fn unset<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            set: WriteSet::new(),
            unset: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}

/// A filter over documents of a single type.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub doc_type: String,
    pub defined: Vec<String>,
    pub equals: Vec<(String, Value)>,
    pub limit: Option<usize>,
}

impl DocumentQuery {
    pub fn of_type(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            defined: Vec::new(),
            equals: Vec::new(),
            limit: None,
        }
    }

    pub fn defined(mut self, field: impl Into<String>) -> Self {
        self.defined.push(field.into());
        self
    }

    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !is_field_name(&self.doc_type) {
            return Err(StoreError::InvalidArg(format!(
                "invalid document type '{}'",
                self.doc_type
            )));
        }
        let fields = self
            .defined
            .iter()
            .chain(self.equals.iter().map(|(field, _)| field));
        for field in fields {
            if !is_field_name(field) {
                return Err(StoreError::InvalidArg(format!("invalid field name '{field}'")));
            }
        }
        Ok(())
    }

    /// Renders the filter as a GROQ query plus its `$param` bindings.
    pub fn to_groq(&self) -> Result<(String, Vec<(String, Value)>)> {
        self.validate()?;

        let mut clauses = vec!["_type == $type".to_string()];
        let mut params = vec![("type".to_string(), Value::String(self.doc_type.clone()))];

        for field in &self.defined {
            clauses.push(format!("defined({field})"));
        }
        for (idx, (field, value)) in self.equals.iter().enumerate() {
            let name = format!("p{idx}");
            clauses.push(format!("{field} == ${name}"));
            params.push((name, value.clone()));
        }

        let mut groq = format!("*[{}] | order(_id asc)", clauses.join(" && "));
        if let Some(limit) = self.limit {
            groq.push_str(&format!(" [0...{limit}]"));
        }
        Ok((groq, params))
    }

    /// Evaluates the filter against a single stored document.
    pub fn matches(&self, document: &Value) -> bool {
        let Some(fields) = document.as_object() else {
            return false;
        };
        if fields.get("_type").and_then(Value::as_str) != Some(self.doc_type.as_str()) {
            return false;
        }
        let defined = self
            .defined
            .iter()
            .all(|field| !matches!(fields.get(field), None | Some(Value::Null)));
        let equal = self
            .equals
            .iter()
            .all(|(field, value)| fields.get(field) == Some(value));
        defined && equal
    }
}

fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prune_unchanged_keeps_only_differences() {
        let mut writes = WriteSet::new();
        writes.set("isVerified", true);
        writes.set("filesCount", 12);
        writes.set("contractAddress", "0xabc");

        let existing = json!({ "isVerified": true, "filesCount": 10 });
        writes.prune_unchanged(existing.as_object().unwrap());

        assert_eq!(writes.field_names(), vec!["contractAddress", "filesCount"]);
    }

    #[test]
    fn blank_covers_missing_null_and_whitespace() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&Value::Null)));
        assert!(is_blank(Some(&json!("   "))));
        assert!(is_blank(Some(&json!({}))));
        assert!(!is_blank(Some(&json!("x"))));
        assert!(!is_blank(Some(&json!(false))));
        assert!(!is_blank(Some(&json!(0))));
    }

    #[test]
    fn groq_binds_values_as_params() {
        let query = DocumentQuery::of_type(TOKEN_TYPE)
            .field_eq("tokenContract", "0xabc")
            .limit(1);
        let (groq, params) = query.to_groq().unwrap();
        assert_eq!(
            groq,
            "*[_type == $type && tokenContract == $p0] | order(_id asc) [0...1]"
        );
        assert_eq!(params[1], ("p0".to_string(), json!("0xabc")));
    }

    #[test]
    fn groq_rejects_injected_field_names() {
        let query = DocumentQuery::of_type(DATA_DAO_TYPE).defined("id) || true || defined(x");
        assert!(matches!(query.to_groq(), Err(StoreError::InvalidArg(_))));
    }
}

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{FetcherError, Result};

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphTotals {
    #[serde(default)]
    pub total_file_contributions: Option<Value>,
    #[serde(default)]
    pub unique_file_contributors: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphRefiner {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub schema_definition_url: String,
}

/// One `dlps` item exactly as the subgraph returns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphDlp {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub creator: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub treasury: String,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_reward_eligible: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub icon_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub website: String,
    #[serde(default)]
    pub totals: Option<SubgraphTotals>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub refiners: Vec<SubgraphRefiner>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
pub struct DlpsData {
    pub dlps: Option<Vec<SubgraphDlp>>,
}

/// Fields of a refiner schema document. Missing values read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefinerSchema {
    pub name: String,
    pub version: String,
    pub description: String,
    pub dialect: String,
    pub schema: String,
}

impl RefinerSchema {
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            FetcherError::Malformed("refiner schema is not a JSON object".to_string())
        })?;
        let field = |key: &str| match object.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        };
        Ok(Self {
            name: field("name"),
            version: field("version"),
            description: field("description"),
            dialect: field("dialect"),
            schema: field("schema"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestRefiner {
    pub id: u64,
    pub url: String,
}

/// A feed item after enrichment. Lives for one run only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDlp {
    pub id: u64,
    pub name: String,
    pub address: String,
    pub creator: String,
    pub owner: String,
    pub token: String,
    pub treasury: String,
    pub metadata: String,
    pub icon_url: String,
    pub website: String,
    pub is_verified: Option<bool>,
    pub is_reward_eligible: bool,
    pub created_at: String,
    pub total_file_contributions: Option<u64>,
    pub unique_file_contributors: Option<u64>,
    pub latest_refiner: Option<LatestRefiner>,
    pub schema: Option<RefinerSchema>,
    pub token_symbol: Option<String>,
}

impl ProcessedDlp {
    /// Converts the raw item, leaving enrichment fields empty.
    pub fn from_raw(raw: SubgraphDlp) -> Result<Self> {
        let id = raw
            .id
            .trim()
            .parse::<u64>()
            .map_err(|err| FetcherError::InvalidRecord {
                id: raw.id.clone(),
                name: raw.name.trim().to_string(),
                reason: format!("id is not a number: {err}"),
            })?;
        let totals = raw.totals.unwrap_or_default();
        Ok(Self {
            id,
            name: raw.name,
            address: raw.address,
            creator: raw.creator,
            owner: raw.owner,
            token: raw.token.trim().to_string(),
            treasury: raw.treasury,
            metadata: raw.metadata,
            icon_url: raw.icon_url,
            website: raw.website,
            is_verified: raw.is_verified,
            is_reward_eligible: raw.is_reward_eligible,
            created_at: raw.created_at,
            total_file_contributions: parse_counter(totals.total_file_contributions.as_ref()),
            unique_file_contributors: parse_counter(totals.unique_file_contributors.as_ref()),
            latest_refiner: None,
            schema: None,
            token_symbol: None,
        })
    }

    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// Subgraph counters are BigInts and arrive as strings; plain numbers are accepted too.
pub fn parse_counter(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::String(text) => text.trim().parse().ok(),
        Value::Number(number) => number.as_u64(),
        _ => None,
    }
}

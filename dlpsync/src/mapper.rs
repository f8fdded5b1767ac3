//! Field tables for DataDAO and token documents.
//!
//! Every stored field the sync writes is listed once with its tier:
//!
//! - `Authority` fields mirror the feed and are rewritten on every run.
//! - `Initial` fields are only written while the stored value is blank, so a
//!   value typed in by an editor is never replaced.
//!
//! Extractors return `None` when the feed has nothing usable for the field; the
//! field is then left out of the write-set instead of being nulled.

use cmsstore::models::is_blank;
use cmsstore::{ImageRef, Reference, WriteSet};
use dlpfetcher::address::is_valid_address;
use dlpfetcher::ProcessedDlp;
use serde_json::{json, Map, Value};

pub const DEFAULT_FREQUENCY: &str = "unspecified";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Authority,
    Initial,
}

pub struct FieldRule<I> {
    pub name: &'static str,
    pub tier: Tier,
    pub extract: fn(&I) -> Option<Value>,
}

/// True when `field` may still be filled in from the feed.
pub fn is_open(existing: Option<&Map<String, Value>>, field: &str) -> bool {
    existing.map_or(true, |fields| is_blank(fields.get(field)))
}

pub fn authority_fields<I>(rules: &[FieldRule<I>], input: &I) -> WriteSet {
    rules
        .iter()
        .filter(|rule| rule.tier == Tier::Authority)
        .filter_map(|rule| (rule.extract)(input).map(|value| (rule.name.to_string(), value)))
        .collect()
}

pub fn initial_fields<I>(
    rules: &[FieldRule<I>],
    input: &I,
    existing: Option<&Map<String, Value>>,
) -> WriteSet {
    rules
        .iter()
        .filter(|rule| rule.tier == Tier::Initial && is_open(existing, rule.name))
        .filter_map(|rule| (rule.extract)(input).map(|value| (rule.name.to_string(), value)))
        .collect()
}

/// Authority and initial fields together, minus anything already stored as-is.
pub fn plan_fields<I>(
    rules: &[FieldRule<I>],
    input: &I,
    existing: Option<&Map<String, Value>>,
) -> WriteSet {
    let mut writes = authority_fields(rules, input);
    writes.extend(initial_fields(rules, input, existing));
    if let Some(existing) = existing {
        writes.prune_unchanged(existing);
    }
    writes
}

fn trimmed(text: &str) -> Option<Value> {
    let text = text.trim();
    (!text.is_empty()).then(|| Value::String(text.to_string()))
}

/// What the DataDAO mapper sees for one feed item.
#[derive(Debug, Clone)]
pub struct DataDaoInput {
    pub dlp: ProcessedDlp,
    /// Imported icon, present only when the import succeeded.
    pub icon: Option<ImageRef>,
    /// Token document id, present only when the token upsert succeeded.
    pub token_id: Option<String>,
}

impl DataDaoInput {
    pub fn new(dlp: ProcessedDlp) -> Self {
        Self {
            dlp,
            icon: None,
            token_id: None,
        }
    }
}

fn contract_address(input: &DataDaoInput) -> Option<Value> {
    let address = input.dlp.address.trim();
    is_valid_address(address).then(|| json!(address.to_lowercase()))
}

fn token_reference(input: &DataDaoInput) -> Option<Value> {
    input
        .token_id
        .as_ref()
        .map(|id| Reference::to(id.clone()).to_value())
}

fn is_verified(input: &DataDaoInput) -> Option<Value> {
    input.dlp.is_verified.map(Value::Bool)
}

fn is_eligible_for_rewards(input: &DataDaoInput) -> Option<Value> {
    Some(Value::Bool(input.dlp.is_reward_eligible))
}

fn contributor_count(input: &DataDaoInput) -> Option<Value> {
    input.dlp.unique_file_contributors.map(|n| json!(n))
}

fn files_count(input: &DataDaoInput) -> Option<Value> {
    input.dlp.total_file_contributions.map(|n| json!(n))
}

fn data_schema_refined(input: &DataDaoInput) -> Option<Value> {
    input
        .dlp
        .latest_refiner
        .as_ref()
        .and_then(|refiner| trimmed(&refiner.url))
}

fn refiner_id(input: &DataDaoInput) -> Option<Value> {
    input.dlp.latest_refiner.as_ref().map(|refiner| json!(refiner.id))
}

fn data_name(input: &DataDaoInput) -> Option<Value> {
    input.dlp.schema.as_ref().and_then(|schema| trimmed(&schema.name))
}

fn data_description(input: &DataDaoInput) -> Option<Value> {
    input
        .dlp
        .schema
        .as_ref()
        .and_then(|schema| trimmed(&schema.description))
}

fn name(input: &DataDaoInput) -> Option<Value> {
    trimmed(&input.dlp.name)
}

fn website(input: &DataDaoInput) -> Option<Value> {
    let website = input.dlp.website.trim();
    (website.starts_with("http://") || website.starts_with("https://"))
        .then(|| json!(website))
}

fn icon(input: &DataDaoInput) -> Option<Value> {
    input.icon.as_ref().map(ImageRef::to_value)
}

fn description(input: &DataDaoInput) -> Option<Value> {
    trimmed(&input.dlp.metadata)
}

fn frequency_of_contribution(_: &DataDaoInput) -> Option<Value> {
    Some(json!(DEFAULT_FREQUENCY))
}

pub const DATA_DAO_FIELDS: &[FieldRule<DataDaoInput>] = &[
    FieldRule { name: "contractAddress", tier: Tier::Authority, extract: contract_address },
    FieldRule { name: "token", tier: Tier::Authority, extract: token_reference },
    FieldRule { name: "isVerified", tier: Tier::Authority, extract: is_verified },
    FieldRule { name: "isEligibleForRewards", tier: Tier::Authority, extract: is_eligible_for_rewards },
    FieldRule { name: "contributorCount", tier: Tier::Authority, extract: contributor_count },
    FieldRule { name: "filesCount", tier: Tier::Authority, extract: files_count },
    FieldRule { name: "dataSchemaRefined", tier: Tier::Authority, extract: data_schema_refined },
    FieldRule { name: "refinerId", tier: Tier::Authority, extract: refiner_id },
    FieldRule { name: "dataName", tier: Tier::Authority, extract: data_name },
    FieldRule { name: "dataDescription", tier: Tier::Authority, extract: data_description },
    FieldRule { name: "name", tier: Tier::Initial, extract: name },
    FieldRule { name: "website", tier: Tier::Initial, extract: website },
    FieldRule { name: "icon", tier: Tier::Initial, extract: icon },
    FieldRule { name: "description", tier: Tier::Initial, extract: description },
    FieldRule { name: "frequencyOfContribution", tier: Tier::Initial, extract: frequency_of_contribution },
];

/// Write-set for a new DataDAO document: every mappable field plus the feed id.
pub fn plan_create(input: &DataDaoInput) -> WriteSet {
    let mut writes = plan_fields(DATA_DAO_FIELDS, input, None);
    writes.set("id", input.dlp.id);
    writes
}

/// Write-set for an existing DataDAO document; empty when nothing changed.
pub fn plan_update(input: &DataDaoInput, existing: &Map<String, Value>) -> WriteSet {
    plan_fields(DATA_DAO_FIELDS, input, Some(existing))
}

/// The description the token should inherit: the one written this pass,
/// else whatever the DataDAO already holds.
pub fn token_description(dlp: &ProcessedDlp, existing: Option<&Map<String, Value>>) -> Option<String> {
    let fresh = is_open(existing, "description")
        .then(|| dlp.metadata.trim())
        .filter(|text| !text.is_empty());
    match fresh {
        Some(text) => Some(text.to_string()),
        None => existing
            .and_then(|fields| fields.get("description"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
    }
}

/// What the token mapper sees for one linked token.
#[derive(Debug, Clone)]
pub struct TokenInput {
    /// Lowercased contract address.
    pub address: String,
    pub symbol: Option<String>,
    pub icon: Option<ImageRef>,
    pub description: Option<String>,
    pub data_dao_id: String,
}

fn token_contract(input: &TokenInput) -> Option<Value> {
    Some(json!(input.address))
}

fn token_symbol(input: &TokenInput) -> Option<Value> {
    input.symbol.as_deref().and_then(trimmed)
}

fn associated_data_dao(input: &TokenInput) -> Option<Value> {
    Some(Reference::to(input.data_dao_id.clone()).to_value())
}

fn token_name(input: &TokenInput) -> Option<Value> {
    token_symbol(input)
}

fn token_icon(input: &TokenInput) -> Option<Value> {
    input.icon.as_ref().map(ImageRef::to_value)
}

fn token_description_field(input: &TokenInput) -> Option<Value> {
    input.description.as_deref().and_then(trimmed)
}

pub const TOKEN_FIELDS: &[FieldRule<TokenInput>] = &[
    FieldRule { name: "tokenContract", tier: Tier::Authority, extract: token_contract },
    FieldRule { name: "tokenSymbol", tier: Tier::Authority, extract: token_symbol },
    FieldRule { name: "associatedDataDAO", tier: Tier::Authority, extract: associated_data_dao },
    FieldRule { name: "tokenName", tier: Tier::Initial, extract: token_name },
    FieldRule { name: "icon", tier: Tier::Initial, extract: token_icon },
    FieldRule { name: "description", tier: Tier::Initial, extract: token_description_field },
];

use std::sync::Arc;

use cmsstore::utils::id::token_document_id;
use cmsstore::{fetch_first, ContentStore, DocumentQuery, Patch, TokenDocument, TOKEN_TYPE};
use dlpfetcher::address::is_valid_address;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::assets::AssetImporter;
use crate::error::Result;
use crate::mapper::{is_open, plan_fields, TokenInput, TOKEN_FIELDS};

/// The DataDAO a stored token points at, when it is not `data_dao_id`.
fn other_owner<'a>(token: Option<&'a TokenDocument>, data_dao_id: &str) -> Option<&'a str> {
    let owner = token?.associated_data_dao.as_ref()?.target.as_str();
    (owner != data_dao_id).then_some(owner)
}

/// Data offered to a token document by one DataDAO.
#[derive(Debug, Clone)]
pub struct TokenLink<'a> {
    pub address: &'a str,
    pub symbol: Option<&'a str>,
    pub icon_url: &'a str,
    pub description: Option<String>,
    pub data_dao_id: &'a str,
}

/// Finds or creates the token document for a contract address and points it
/// back at its DataDAO.
#[derive(Clone)]
pub struct TokenLinker {
    store: Arc<dyn ContentStore>,
    assets: AssetImporter,
}

impl TokenLinker {
    pub fn new(store: Arc<dyn ContentStore>, assets: AssetImporter) -> Self {
        Self { store, assets }
    }

    /// Returns the token document id, or `None` when the address is invalid
    /// or the store rejected the write.
    pub async fn upsert(&self, link: TokenLink<'_>) -> Option<String> {
        if !is_valid_address(link.address.trim()) {
            debug!(address = link.address, "skipping token with invalid address");
            return None;
        }
        let address = link.address.trim().to_lowercase();
        match self.try_upsert(&address, link).await {
            Ok(document_id) => Some(document_id),
            Err(err) => {
                error!(address = %address, error = %err, "failed to create/update token");
                None
            }
        }
    }

    async fn try_upsert(&self, address: &str, link: TokenLink<'_>) -> Result<String> {
        let existing: Option<TokenDocument> = fetch_first(
            self.store.as_ref(),
            DocumentQuery::of_type(TOKEN_TYPE).field_eq("tokenContract", address),
        )
        .await?;
        if let Some(owner) = other_owner(existing.as_ref(), link.data_dao_id) {
            warn!(
                address = %address,
                previous = owner,
                current = link.data_dao_id,
                "token is shared by several DataDAOs, moving its back-reference"
            );
        }
        let stored = existing.as_ref().map(TokenDocument::fields);
        let existing_fields = stored.as_ref();

        let icon = if is_open(existing_fields, "icon") {
            self.assets
                .import(link.icon_url, &format!("token-{address}-icon"))
                .await
        } else {
            None
        };

        let input = TokenInput {
            address: address.to_string(),
            symbol: link.symbol.map(str::to_string),
            icon,
            description: link.description,
            data_dao_id: link.data_dao_id.to_string(),
        };
        let writes = plan_fields(TOKEN_FIELDS, &input, existing_fields);

        match existing.map(|token| token.document_id) {
            Some(document_id) => {
                if writes.is_empty() {
                    debug!(document_id = %document_id, "token unchanged");
                } else {
                    debug!(document_id = %document_id, fields = ?writes.field_names(), "updating token");
                    self.store.patch(&document_id, Patch::set(writes)).await?;
                }
                Ok(document_id)
            }
            None => {
                let document_id = token_document_id(address);
                let mut document = writes.into_map();
                document.insert("_id".to_string(), Value::String(document_id.clone()));
                document.insert("_type".to_string(), Value::String(TOKEN_TYPE.to_string()));
                debug!(document_id = %document_id, "creating published token");
                self.store.create_or_replace(Value::Object(document)).await?;
                info!(
                    document_id = %document_id,
                    symbol = link.symbol.unwrap_or_default(),
                    "created token"
                );
                Ok(document_id)
            }
        }
    }
}

pub const DRAFTS_PREFIX: &str = "drafts.";

pub fn data_dao_document_id(dlp_id: u64) -> String {
    format!("dataDAO-{dlp_id}")
}

/// Token documents are keyed by their lowercased contract address.
pub fn token_document_id(token_contract: &str) -> String {
    format!("token-{}", token_contract.to_lowercase())
}

pub fn draft_id(document_id: &str) -> String {
    if is_draft_id(document_id) {
        document_id.to_string()
    } else {
        format!("{DRAFTS_PREFIX}{document_id}")
    }
}

pub fn is_draft_id(document_id: &str) -> bool {
    document_id.starts_with(DRAFTS_PREFIX)
}

pub fn published_id(document_id: &str) -> &str {
    document_id
        .strip_prefix(DRAFTS_PREFIX)
        .unwrap_or(document_id)
}

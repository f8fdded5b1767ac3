//! HTTP client for the hosted content store (query, mutate and asset endpoints).

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::StoreConfig;
use crate::errors::{Result, StoreError};
use crate::models::{AssetDocument, DocumentQuery, Patch};
use crate::store::ContentStore;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    document: AssetDocument,
}

#[derive(Clone, Debug)]
pub struct CmsClient {
    http: Client,
    config: StoreConfig,
}

impl CmsClient {
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            http: Client::new(),
            config,
        })
    }

    pub fn with_http_client(config: StoreConfig, http: Client) -> Result<Self> {
        config.validate()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn endpoint(&self, kind: &str) -> String {
        format!("{}/{}/{}", self.config.api_base(), kind, self.config.dataset)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.config.token)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn mutate(&self, mutations: Vec<Value>) -> Result<()> {
        let url = self.endpoint("data/mutate");
        log::debug!("Submitting {} mutation(s) to {}", mutations.len(), url);
        let response = self
            .authorized(self.http.post(&url))
            .query(&[("returnIds", "true"), ("visibility", "sync")])
            .json(&json!({ "mutations": mutations }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

fn patch_mutation(document_id: &str, patch: Patch) -> Value {
    let mut body = Map::new();
    body.insert("id".to_string(), Value::String(document_id.to_string()));
    if !patch.set.is_empty() {
        body.insert("set".to_string(), Value::Object(patch.set.into_map()));
    }
    if !patch.unset.is_empty() {
        body.insert("unset".to_string(), json!(patch.unset));
    }
    json!({ "patch": body })
}

/// Drafts are visible under their `drafts.` ids.
const RAW_PERSPECTIVE: &str = "raw";

#[async_trait]
impl ContentStore for CmsClient {
    async fn fetch_documents(&self, query: &DocumentQuery) -> Result<Vec<Value>> {
        let (groq, params) = query.to_groq()?;
        let mut pairs = vec![
            ("query".to_string(), groq),
            ("perspective".to_string(), RAW_PERSPECTIVE.to_string()),
        ];
        for (name, value) in params {
            pairs.push((format!("${name}"), serde_json::to_string(&value)?));
        }

        let response = self
            .authorized(self.http.get(self.endpoint("data/query")))
            .query(&pairs)
            .send()
            .await?;
        let body: QueryResponse = Self::check(response).await?.json().await?;

        match body.result {
            Value::Array(docs) => Ok(docs),
            Value::Null => Ok(Vec::new()),
            other => Err(StoreError::Malformed(format!(
                "expected an array of documents, got {other}"
            ))),
        }
    }

    async fn patch(&self, document_id: &str, patch: Patch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.mutate(vec![patch_mutation(document_id, patch)]).await
    }

    async fn create_or_replace(&self, document: Value) -> Result<()> {
        let has_id = document
            .get("_id")
            .and_then(Value::as_str)
            .is_some_and(|id| !id.is_empty());
        if !has_id || document.get("_type").is_none() {
            return Err(StoreError::InvalidArg(
                "documents need both _id and _type".to_string(),
            ));
        }
        self.mutate(vec![json!({ "createOrReplace": document })]).await
    }

    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<AssetDocument> {
        let mut request = self
            .authorized(self.http.post(self.endpoint("assets/images")))
            .query(&[("filename", filename)]);
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        let response = request.body(bytes).send().await?;
        let body: AssetResponse = Self::check(response).await?.json().await?;
        log::info!("Uploaded image asset {}", body.document.id);
        Ok(body.document)
    }
}

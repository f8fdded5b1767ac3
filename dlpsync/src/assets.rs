use std::sync::Arc;

use async_trait::async_trait;
use cmsstore::{ContentStore, ImageRef};
use dlpfetcher::{FetcherError, GatewayFetcher};
use tracing::{debug, error, info};

/// Downloads the raw bytes behind an asset URL.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn download(&self, url: &str) -> Result<Vec<u8>, FetcherError>;
}

#[async_trait]
impl AssetSource for GatewayFetcher {
    async fn download(&self, url: &str) -> Result<Vec<u8>, FetcherError> {
        self.fetch_bytes(url).await
    }
}

/// Placeholder values such as `""` or `"-"` and anything that does not parse
/// as a URL are never downloaded.
pub fn is_importable_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && url != "-" && url::Url::parse(url).is_ok()
}

/// Copies remote images into the store's asset library.
#[derive(Clone)]
pub struct AssetImporter {
    source: Arc<dyn AssetSource>,
    store: Arc<dyn ContentStore>,
}

impl AssetImporter {
    pub fn new(source: Arc<dyn AssetSource>, store: Arc<dyn ContentStore>) -> Self {
        Self { source, store }
    }

    /// Returns an image value for the uploaded asset, or `None` on any failure.
    pub async fn import(&self, url: &str, filename: &str) -> Option<ImageRef> {
        if !is_importable_url(url) {
            if !url.trim().is_empty() && url.trim() != "-" {
                error!(url, "invalid image URL");
            }
            return None;
        }
        let url = url.trim();

        debug!(url, filename, "importing image");
        let bytes = match self.source.download(url).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                error!(url, "image download returned no data");
                return None;
            }
            Err(err) => {
                error!(url, error = %err, "failed to download image");
                return None;
            }
        };

        match self.store.upload_image(bytes, filename, None).await {
            Ok(asset) => {
                info!(asset_id = %asset.id, filename, "uploaded image");
                Some(ImageRef::for_asset(asset.id))
            }
            Err(err) => {
                error!(url, filename, error = %err, "failed to upload image");
                None
            }
        }
    }
}



use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{AssetError, AssetStore};
use crate::catalog::AssetRef;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    public_id: &'a str,
}

#[derive(Debug, Deserialize, Default)]
struct DeleteResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    result: Option<DestroyResult>,
    #[serde(default)]
    error: Option<String>,
}

/// The CDN's own destroy result, passed through by the endpoint.
#[derive(Debug, Deserialize, Default)]
struct DestroyResult {
    #[serde(default)]
    result: Option<String>,
}

impl DeleteResponse {
    fn outcome(&self) -> Option<&str> {
        self.result.as_ref().and_then(|r| r.result.as_deref())
    }
}

/// Deletes images through the site's serverless delete function, which
/// takes `{"publicId": ...}` and holds the CDN credentials itself.
pub struct HttpAssetStore {
    endpoint: String,
    client: Client,
}

impl HttpAssetStore {

    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AssetError> {
        let endpoint = endpoint.into();
        let client = Client::builder().timeout(timeout).build()?;
        info!("HTTP asset store initialized (endpoint={})", endpoint);
        Ok(Self { endpoint, client })
    }


    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn delete_asset(&self, asset: &AssetRef) -> Result<(), AssetError> {
        let public_id = asset
            .public_id()
            .ok_or_else(|| AssetError::InvalidRef(asset.to_string()))?;

        debug!("Deleting asset {} via {}", public_id, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&DeleteRequest {
                public_id: &public_id,
            })
            .send()
            .await?;

        let status = response.status();
        let body: DeleteResponse = response.json().await.unwrap_or_default();

        if status == StatusCode::NOT_FOUND || body.outcome() == Some("not found") {
            warn!("Asset {} already gone, treating as deleted", public_id);
            return Ok(());
        }

        if !status.is_success() || body.success == Some(false) {
            return Err(AssetError::Rejected {
                status: status.as_u16(),
                message: body
                    .error
                    .unwrap_or_else(|| "Failed to delete asset".to_string()),
            });
        }

        info!("Deleted asset {}", public_id);
        Ok(())
    }

    fn accepts(&self, asset: &AssetRef) -> bool {
        asset.public_id().is_some()
    }

    fn store_name(&self) -> &str {
        "http"
    }
}

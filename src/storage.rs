//! Object storage behind a trait, with a Supabase Storage implementation.
//!
//! Template background images live here; the renderer fetches them (and
//! trainee photos) over plain HTTP via their public URLs.

use async_trait::async_trait;
use std::env;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload_file(&self, filename: &str, file_data: &[u8]) -> Result<(), String>;

    async fn delete_file(&self, filename: &str) -> Result<(), String>;

    fn get_asset_url(&self, filename: &str) -> String;

    /// Extract the object name from a public URL produced by
    /// [`ObjectStorage::get_asset_url`]. Foreign URLs yield `None`.
    fn object_name_from_url(&self, url: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
    pub bucket: String,
}

impl SupabaseConfig {
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("SUPABASE_URL").map_err(|_| "SUPABASE_URL must be set".to_string())?;
        let service_key = env::var("SUPABASE_SERVICE_KEY")
            .map_err(|_| "SUPABASE_SERVICE_KEY must be set".to_string())?;
        let bucket = env::var("SUPABASE_BUCKET").unwrap_or_else(|_| "certificates".to_string());
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            service_key,
            bucket,
        })
    }
}

pub struct SupabaseStorage {
    config: SupabaseConfig,
    client: reqwest::Client,
}

impl SupabaseStorage {
    pub fn new(config: SupabaseConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn object_endpoint(&self, filename: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url, self.config.bucket, filename
        )
    }

}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload_file(&self, filename: &str, file_data: &[u8]) -> Result<(), String> {
        let response = self
            .client
            .post(self.object_endpoint(filename))
            .bearer_auth(&self.config.service_key)
            .header("x-upsert", "true")
            .body(file_data.to_vec())
            .send()
            .await
            .map_err(|e| format!("storage upload request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("storage upload failed ({}): {}", status, body));
        }
        Ok(())
    }

    async fn delete_file(&self, filename: &str) -> Result<(), String> {
        let response = self
            .client
            .delete(self.object_endpoint(filename))
            .bearer_auth(&self.config.service_key)
            .send()
            .await
            .map_err(|e| format!("storage delete request failed: {}", e))?;

        // Deleting an already-gone object is not an error for callers.
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(format!("storage delete failed ({})", response.status()));
        }
        Ok(())
    }

    fn get_asset_url(&self, filename: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url, self.config.bucket, filename
        )
    }

    fn object_name_from_url(&self, url: &str) -> Option<String> {
        let prefix = format!(
            "{}/storage/v1/object/public/{}/",
            self.config.url, self.config.bucket
        );
        url.strip_prefix(&prefix).map(str::to_string)
    }
}

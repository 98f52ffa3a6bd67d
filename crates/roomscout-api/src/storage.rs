// Object storage: upload, remove and public URLs
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::{BackendClient, Result};
use crate::retry::with_retry;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: Option<String>,
}

impl BackendClient {
    /// Upload bytes to `bucket/path`. Existing objects are never overwritten.
    ///
    /// Returns the storage key reported by the backend.
    pub async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let url = self.endpoint(&format!(
            "storage/v1/object/{}/{}",
            encode_path(bucket),
            encode_path(path)
        ));
        debug!("Uploading {} bytes to {}/{}", bytes.len(), bucket, path);

        // Not retried; the object may already exist after a lost response

        let response = self
            .request(Method::POST, &url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CACHE_CONTROL, "max-age=3600")
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        let response = Self::check(response, &format!("upload {}", path)).await?;
        let body: UploadResponse = response.json().await?;

        let key = body.key.unwrap_or_else(|| format!("{}/{}", bucket, path));
        info!("Stored object {}", key);
        Ok(key)
    }

    /// Remove objects from a bucket
    pub async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let url = self.endpoint(&format!("storage/v1/object/{}", encode_path(bucket)));
        let body = serde_json::json!({ "prefixes": paths });

        with_retry(&self.retry_config, || async {
            let response = self
                .request(Method::DELETE, &url)
                .json(&body)
                .send()
                .await?;
            Self::check(response, "remove objects").await?;
            Ok(())
        })
        .await
    }

    /// Public URL for an object in a public bucket
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(&format!(
            "storage/v1/object/public/{}/{}",
            encode_path(bucket),
            encode_path(path)
        ))
    }
}

/// Percent-encode each segment of an object path, keeping the separators
pub fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Recover the object path from a public URL produced for `bucket`
pub fn object_path_from_public_url(url: &str, bucket: &str) -> Option<String> {
    let marker = format!("/object/public/{}/", encode_path(bucket));
    let start = url.find(&marker)? + marker.len();
    let rest = url[start..].split(['?', '#']).next().unwrap_or_default();
    if rest.is_empty() {
        return None;
    }

    urlencoding::decode(rest).ok().map(|p| p.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_path_keeps_separators() {
        assert_eq!(encode_path("users/u-1/photo 1.png"), "users/u-1/photo%201.png");
        assert_eq!(encode_path("/avatars/"), "avatars");
    }

    #[test]
    fn test_public_url() {
        let client = BackendClient::new("https://example.supabase.co", "anon").unwrap();
        assert_eq!(
            client.public_url("avatars", "users/u-1/1700000000000-ab12cd34.png"),
            "https://example.supabase.co/storage/v1/object/public/avatars/users/u-1/1700000000000-ab12cd34.png"
        );
    }

    #[test]
    fn test_object_path_roundtrip_through_public_url() {
        let client = BackendClient::new("https://example.supabase.co", "anon").unwrap();
        let url = client.public_url("avatars", "users/u-1/my photo.jpg");

        assert_eq!(
            object_path_from_public_url(&url, "avatars").as_deref(),
            Some("users/u-1/my photo.jpg")
        );
    }

    #[test]
    fn test_object_path_ignores_foreign_urls() {
        assert_eq!(
            object_path_from_public_url("https://cdn.example.com/a.png", "avatars"),
            None
        );
        assert_eq!(
            object_path_from_public_url(
                "https://x.supabase.co/storage/v1/object/public/avatars/users/a.png?t=1",
                "avatars"
            )
            .as_deref(),
            Some("users/a.png")
        );
        assert_eq!(
            object_path_from_public_url(
                "https://x.supabase.co/storage/v1/object/public/avatars/",
                "avatars"
            ),
            None
        );
    }
}

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::debug;

use crate::config::CloudinaryConfig;

/// Fixed incoming transform applied to every avatar upload.
const AVATAR_TRANSFORMATION: &str = "c_fill,h_250,w_250";

/// External image CDN behind a narrow seam.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload an image under `public_id` and return its public delivery URL.
    async fn upload_avatar(
        &self,
        image: Bytes,
        content_type: &str,
        public_id: &str,
    ) -> anyhow::Result<String>;
}

pub struct Cloudinary {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    version: u64,
}

impl Cloudinary {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// SHA-256 request signature over the sorted upload parameters plus the
    /// API secret, as Cloudinary's signed-upload contract requires.
    fn sign_upload(&self, public_id: &str, timestamp: i64) -> String {
        let to_sign = format!(
            "overwrite=true&public_id={}&timestamp={}&transformation={}{}",
            public_id, timestamp, AVATAR_TRANSFORMATION, self.config.api_secret
        );
        let digest = Sha256::digest(to_sign.as_bytes());
        digest.iter().fold(String::new(), |mut out, b| {
            out.push_str(&format!("{b:02x}"));
            out
        })
    }

    fn delivery_url(&self, public_id: &str, version: u64) -> String {
        format!(
            "https://res.cloudinary.com/{}/image/upload/v{}/{}",
            self.config.cloud_name, version, public_id
        )
    }
}

#[async_trait]
impl ImageHost for Cloudinary {
    async fn upload_avatar(
        &self,
        image: Bytes,
        content_type: &str,
        public_id: &str,
    ) -> anyhow::Result<String> {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let signature = self.sign_upload(public_id, timestamp);

        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("avatar")
            .mime_str(content_type)
            .context("invalid upload content type")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("public_id", public_id.to_string())
            .text("overwrite", "true")
            .text("transformation", AVATAR_TRANSFORMATION)
            .text("signature", signature);

        let endpoint = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        );
        let response = self
            .http
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .context("cloudinary upload request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("cloudinary upload failed: {status}: {body}");
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .context("decode cloudinary response")?;
        debug!(public_id = %uploaded.public_id, version = uploaded.version, "avatar uploaded");
        Ok(self.delivery_url(&uploaded.public_id, uploaded.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CloudinaryConfig;

    fn make_client(secret: &str) -> Cloudinary {
        Cloudinary::new(CloudinaryConfig {
            cloud_name: "demo".into(),
            api_key: "key".into(),
            api_secret: secret.into(),
        })
    }

    #[test]
    fn signature_is_deterministic_hex() {
        let client = make_client("s3cret");
        let a = client.sign_upload("avatars/bob", 1_700_000_000);
        let b = client.sign_upload("avatars/bob", 1_700_000_000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_depends_on_secret_and_params() {
        let client = make_client("s3cret");
        let other = make_client("different");
        assert_ne!(
            client.sign_upload("avatars/bob", 1_700_000_000),
            other.sign_upload("avatars/bob", 1_700_000_000)
        );
        assert_ne!(
            client.sign_upload("avatars/bob", 1_700_000_000),
            client.sign_upload("avatars/alice", 1_700_000_000)
        );
    }

    #[test]
    fn delivery_url_is_versioned() {
        let client = make_client("s3cret");
        assert_eq!(
            client.delivery_url("avatars/bob", 123),
            "https://res.cloudinary.com/demo/image/upload/v123/avatars/bob"
        );
    }
}

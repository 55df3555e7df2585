use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::UploadError;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Answer to a single image upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    pub label: String,
    /// Annotated copy of the upload, relative to the service origin.
    pub image_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub label: String,
    pub image_url: String,
}

/// One-shot classify-an-image client. No streaming state.
#[derive(Clone)]
pub struct UploadClient {
    client: Client,
    origin: String,
}

impl UploadClient {
    pub fn new(origin: &str) -> Result<Self, UploadError> {
        let client = Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }

    pub fn timeout(&self) -> Duration {
        UPLOAD_TIMEOUT
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// `image_path` as returned by the service, made absolute against the origin.
    pub fn resolve(&self, image_path: &str) -> String {
        if image_path.starts_with("http://") || image_path.starts_with("https://") {
            return image_path.to_string();
        }
        format!("{}/{}", self.origin, image_path.trim_start_matches('/'))
    }

    pub async fn classify_file(&self, path: &Path) -> Result<UploadResult> {
        let (file_name, mime) = upload_target(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;

        let part = Part::bytes(bytes).file_name(file_name.clone()).mime_str(mime)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/uploadfile/", self.origin))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UploadError::Status(response.status()).into());
        }

        let body: UploadResponse = response.json().await?;
        info!(file = %file_name, label = %body.label, "image classified");
        Ok(UploadResult {
            image_url: self.resolve(&body.image_path),
            label: body.label,
        })
    }
}

/// File name and MIME type for an upload, rejecting anything the service refuses.
fn upload_target(path: &Path) -> Result<(String, &'static str), UploadError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| UploadError::UnsupportedFileType(path.display().to_string()))?;

    let lower = file_name.to_ascii_lowercase();
    let mime = if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        return Err(UploadError::UnsupportedFileType(file_name));
    };
    Ok((file_name, mime))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_paths_against_origin() {
        let client = UploadClient::new("http://localhost:8000/").expect("client builds");
        assert_eq!(
            client.resolve("/processed/processed_hand.jpg"),
            "http://localhost:8000/processed/processed_hand.jpg"
        );
        assert_eq!(client.resolve("processed/a.png"), "http://localhost:8000/processed/a.png");
        assert_eq!(client.resolve("https://cdn.example/a.png"), "https://cdn.example/a.png");
    }

    #[test]
    fn client_keeps_its_timeout() {
        let client = UploadClient::new("http://localhost:8000").expect("client builds");
        assert_eq!(client.timeout(), Duration::from_secs(30));
        assert_eq!(client.origin(), "http://localhost:8000");
    }

    #[test]
    fn only_png_and_jpeg_are_uploaded() {
        assert_eq!(upload_target(Path::new("/tmp/Hand.PNG")).unwrap().1, "image/png");
        assert_eq!(upload_target(Path::new("hand.jpeg")).unwrap().1, "image/jpeg");
        assert_eq!(upload_target(Path::new("hand.jpg")).unwrap().0, "hand.jpg");
        assert!(matches!(
            upload_target(Path::new("hand.gif")),
            Err(UploadError::UnsupportedFileType(_))
        ));
        assert!(upload_target(Path::new("/")).is_err());
    }
}

// ABOUTME: Category content uploads: a document or image with title, notes, category and tags.
// ABOUTME: Built as multipart so the same upload can be re-sent after a token refresh.

use http::Method;

use crate::client::{ApiClient, read_json};
use crate::error::ClientError;
use crate::request::{MultipartBody, RequestBody, RequestOptions};

pub const CONTENT_CREATE_PATH: &str = "/category-content/create";

/// File attached to an upload as `media_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadFile {
    /// Content type is guessed from the file extension.
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name).map(String::from);
        Self {
            file_name,
            content_type,
            data,
        }
    }
}

/// A new piece of category content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentUpload {
    pub title: String,
    pub notes: String,
    pub category_id: String,
    pub tags: Vec<String>,
    pub file: Option<UploadFile>,
}

impl ContentUpload {
    /// Wire layout: `title`, `notes`, `category_id`, optional `media_file`,
    /// then one `tags[i]` field per tag.
    pub fn to_multipart(&self) -> MultipartBody {
        let mut body = MultipartBody::new()
            .text("title", &self.title)
            .text("notes", &self.notes)
            .text("category_id", &self.category_id);

        if let Some(file) = &self.file {
            body = body.file(
                "media_file",
                &file.file_name,
                file.content_type.as_deref(),
                file.data.clone(),
            );
        }

        for (i, tag) in self.tags.iter().enumerate() {
            body = body.text(format!("tags[{}]", i), tag);
        }
        body
    }
}

impl ApiClient {
    /// Upload new content to a category.
    pub async fn create_content(&self, upload: &ContentUpload) -> Result<serde_json::Value, ClientError> {
        let response = self
            .request(
                Method::POST,
                CONTENT_CREATE_PATH,
                RequestBody::Multipart(upload.to_multipart()),
                RequestOptions::new(),
            )
            .await?;
        tracing::info!(title = %upload.title, tags = upload.tags.len(), "content uploaded");
        read_json(response).await
    }
}

fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "mp4" => Some("video/mp4"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

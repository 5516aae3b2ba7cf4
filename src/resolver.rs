use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::{
    CONTENT_TYPE_OCTET_STREAM, ObjectMetadata, OutcomeRecord, UploadItem, file_name_of,
};

pub const REASON_RESOURCE_NOT_FOUND: &str = "resource not found";

/// Result of looking up the local resource for a requested key.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(UploadItem),
    /// The resource is missing; carries the failure record to report.
    Missing(OutcomeRecord),
}

/// Maps requested keys onto files in a flat local resource directory.
#[derive(Debug, Clone)]
pub struct ResourceResolver {
    resource_dir: PathBuf,
}

impl ResourceResolver {
    pub fn new(resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            resource_dir: resource_dir.into(),
        }
    }

    /// The local file is `resource_dir/<final segment of key>`. Found items are
    /// always uploaded publicly readable.
    pub fn resolve(&self, key: &str) -> Resolution {
        let file_name = file_name_of(key);
        let local_path = self.resource_dir.join(&file_name);

        if !local_path.is_file() {
            debug!(key = key, path = %local_path.display(), "resource not found.");
            return Resolution::Missing(OutcomeRecord::failure(
                file_name,
                local_path.display().to_string(),
                REASON_RESOURCE_NOT_FOUND,
            ));
        }

        let content_type = content_type_for(&local_path);
        Resolution::Found(UploadItem {
            key: key.to_string(),
            local_path,
            metadata: ObjectMetadata::public_read(content_type),
        })
    }
}

/// Content type guessed from the file extension; `application/octet-stream`
/// when the extension is missing or unknown.
pub fn content_type_for(path: &Path) -> &'static str {
    let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
        return CONTENT_TYPE_OCTET_STREAM;
    };

    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/vnd.microsoft.icon",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "xml" => "text/xml",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "wasm" => "application/wasm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp3" => "audio/mpeg",
        "wav" => "audio/x-wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => CONTENT_TYPE_OCTET_STREAM,
    }
}

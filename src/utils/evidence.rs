use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use uuid::Uuid;

use crate::error::AppError;

pub const MAX_EVIDENCE_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_EXTENSIONS: [&str; 5] = ["pdf", "png", "jpg", "jpeg", "webp"];
const MAX_STEM_CHARS: usize = 100;

/// Decoded upload waiting to be written under the media root.
#[derive(Debug)]
pub struct EvidenceFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Strips any directory part, keeps a conservative character set and
/// shortens the stem so the stored path fits the filesystem and the column.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let clean: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let (stem, extension) = match clean.rsplit_once('.') {
        Some((stem, ext)) if ext.len() <= 10 => (stem, Some(ext)),
        _ => (clean.as_str(), None),
    };
    let stem: String = stem.chars().take(MAX_STEM_CHARS).collect();
    match extension {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

pub fn decode(file_name: &str, base64_body: &str) -> Result<EvidenceFile, AppError> {
    let file_name = sanitize_file_name(file_name);
    let extension = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::field(
            "evidence",
            format!("Evidence must be one of: {}.", ALLOWED_EXTENSIONS.join(", ")),
        ));
    }

    let bytes = STANDARD
        .decode(base64_body.trim())
        .map_err(|_| AppError::field("evidence", "Evidence is not valid base64."))?;

    if bytes.is_empty() {
        return Err(AppError::field("evidence", "Evidence file is empty."));
    }
    if bytes.len() > MAX_EVIDENCE_BYTES {
        return Err(AppError::field("evidence", "Evidence file is larger than 5 MB."));
    }

    Ok(EvidenceFile { file_name, bytes })
}

/// Writes the file to `<media_root>/leave_evidence/<uuid>_<name>` and returns
/// the path relative to the media root.
pub fn save(media_root: &str, file: EvidenceFile) -> std::io::Result<String> {
    let relative = format!("leave_evidence/{}_{}", Uuid::new_v4().to_simple(), file.file_name);
    let full: PathBuf = Path::new(media_root).join(&relative);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&full, &file.bytes)?;
    Ok(relative)
}

/// Deletes a file written by `save`.
pub fn remove(media_root: &str, relative: &str) -> std::io::Result<()> {
    std::fs::remove_file(Path::new(media_root).join(relative))
}

//! Utility functions and helpers for file naming and upload payloads

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

use crate::error::{AppError, Result};

/// Ensure a directory exists, creating it if necessary
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Generate a unique filename with a timestamp
pub(crate) fn generate_filename(prefix: &str, extension: &str) -> String {
    format!("{}_{}.{}", prefix, timestamp(), extension.trim_start_matches('.'))
}

/// Prefix a sanitized upload name with a timestamp
pub(crate) fn timestamped_filename(original: &str) -> String {
    format!("{}_{}", timestamp(), sanitize_filename(original))
}

/// Reduce a client-supplied filename to `[A-Za-z0-9._-]`.
///
/// Directory components are dropped and the extension is kept even when the
/// stem sanitizes to nothing.
pub(crate) fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let path = Path::new(base);
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect::<String>()
            .trim_matches(|c| c == '.' || c == '_')
            .to_string()
    };

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(clean)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "upload".to_string());

    match path.extension().and_then(|e| e.to_str()).map(clean) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext.to_lowercase()),
        _ => stem,
    }
}

/// Validate that a file has an allowed extension
pub(crate) fn validate_file_extension<S: AsRef<str>>(
    filename: &str,
    allowed_extensions: &[S],
) -> bool {
    if let Some(ext) = Path::new(filename).extension() {
        if let Some(ext_str) = ext.to_str() {
            return allowed_extensions
                .iter()
                .any(|e| e.as_ref().eq_ignore_ascii_case(ext_str));
        }
    }
    false
}

/// Decode a base64 image payload, with or without a `data:...;base64,`
/// prefix.
pub(crate) fn decode_data_url(payload: &str) -> Result<Vec<u8>> {
    let encoded = match payload.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        Some(_) => return Err(AppError::InvalidInput("Malformed data URL".to_string())),
        None => payload,
    };

    let bytes = STANDARD.decode(encoded.trim())?;
    if bytes.is_empty() {
        return Err(AppError::InvalidInput("Empty image payload".to_string()));
    }
    Ok(bytes)
}

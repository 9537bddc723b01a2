use actix_multipart::Field;
use futures::StreamExt;
use lazy_static::lazy_static;
use std::collections::HashSet;
use std::path::Path;

use crate::utils::error::AppError;

lazy_static! {
    /// Accepted upload types, matched against the file extension.
    static ref IMAGE_EXTENSIONS: HashSet<&'static str> =
        ["jpeg", "jpg", "png", "gif"].iter().copied().collect();
}

pub fn images_dir() -> String {
    std::env::var("IMAGES_DIR").unwrap_or_else(|_| "./images".to_string())
}

pub fn is_allowed_image(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Stored name: millisecond timestamp prefix keeps uploads of the same
/// original name apart.
pub fn stored_filename(original: &str) -> String {
    format!("{}-{}", chrono::Utc::now().timestamp_millis(), original)
}

/// Drains an `image` multipart field to the images directory and returns the
/// stored filename. Recipes persist the filename only; serving the bytes
/// back is actix-files territory.
pub async fn save_image(field: &mut Field) -> Result<String, AppError> {
    let original = field
        .content_disposition()
        .get_filename()
        .map(|name| name.to_string())
        .ok_or_else(|| AppError::Validation("image field is missing a filename".to_string()))?;

    if !is_allowed_image(&original) {
        return Err(AppError::Validation("Images only!".to_string()));
    }

    let mut bytes: Vec<u8> = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?;
        bytes.extend_from_slice(&chunk);
    }

    let dir = images_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create images dir: {}", e)))?;

    let filename = stored_filename(&original);
    let path = Path::new(&dir).join(&filename);
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| AppError::Database(format!("Failed to store image: {}", e)))?;

    log::info!("🖼️ Stored image {} ({} bytes)", filename, bytes.len());
    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions() {
        assert!(is_allowed_image("dish.jpg"));
        assert!(is_allowed_image("dish.jpeg"));
        assert!(is_allowed_image("dish.PNG"));
        assert!(is_allowed_image("dish.gif"));
        assert!(!is_allowed_image("dish.webp"));
        assert!(!is_allowed_image("dish.pdf"));
        assert!(!is_allowed_image("dish"));
    }

    #[test]
    fn test_stored_filename_keeps_original_name() {
        let name = stored_filename("soup.png");
        assert!(name.ends_with("-soup.png"));
    }
}

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

use crate::constants::MEDIA_URL_PREFIX;
use crate::error::Error;

/// Decodes a `data:image/<subtype>;base64,<payload>` string (a bare
/// base64 payload is treated as PNG) and stores it under `media_root`
/// with a fresh uuid filename. Returns the filename kept in the recipe
/// row.
pub fn save_image(payload: &str, media_root: &str) -> Result<String, Error> {
    let (extension, data) = match payload.split_once(',') {
        Some((meta, data)) => (extension_from_meta(meta)?, data),
        None => ("png", payload),
    };

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|_| Error::validation("image payload is not valid base64"))?;
    if bytes.is_empty() {
        return Err(Error::validation("image payload is empty"));
    }

    let filename = format!("{}.{}", Uuid::new_v4(), extension);
    fs::create_dir_all(media_root)
        .map_err(|e| Error::Database(format!("failed to prepare media root: {e}")))?;
    fs::write(Path::new(media_root).join(&filename), bytes)
        .map_err(|e| Error::Database(format!("failed to store image: {e}")))?;

    Ok(filename)
}

/// URL path served for a stored media filename.
pub fn image_url(filename: &str) -> String {
    format!("{MEDIA_URL_PREFIX}{filename}")
}

fn extension_from_meta(meta: &str) -> Result<&'static str, Error> {
    let subtype = meta
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split(';').next())
        .ok_or_else(|| Error::validation("image payload is not a data uri"))?;

    match subtype {
        "png" => Ok("png"),
        "jpeg" | "jpg" => Ok("jpg"),
        "gif" => Ok("gif"),
        "webp" => Ok("webp"),
        _ => Err(Error::Validation(format!(
            "unsupported image type: {subtype}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_media_root() -> String {
        std::env::temp_dir()
            .join(format!("foodgram-media-{}", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn data_uri_payload_is_stored() {
        let root = temp_media_root();
        let payload = format!("data:image/png;base64,{}", STANDARD.encode(b"not-a-real-png"));
        let filename = save_image(&payload, &root).unwrap();

        assert!(filename.ends_with(".png"));
        assert!(Path::new(&root).join(&filename).exists());
        assert_eq!(image_url(&filename), format!("/media/{filename}"));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn jpeg_maps_to_jpg() {
        assert_eq!(extension_from_meta("data:image/jpeg;base64").unwrap(), "jpg");
    }

    #[test]
    fn garbage_payload_is_rejected() {
        let root = temp_media_root();
        assert!(save_image("data:image/png;base64,?not-base64?", &root).is_err());
        assert!(save_image("data:video/mp4;base64,AAAA", &root).is_err());
    }
}

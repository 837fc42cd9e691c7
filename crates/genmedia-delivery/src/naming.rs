//! Output file naming.

use chrono::{DateTime, Utc};

/// `<prefix>-<YYYYMMDD-HHMMSS>-<8 hex>.<ext>`, with `/`, `:` and whitespace
/// in the prefix replaced by `_`.
pub fn generate_filename(prefix: &str, extension: &str, now: DateTime<Utc>) -> String {
    let prefix = sanitize(prefix);
    let prefix = if prefix.is_empty() { "genmedia".to_string() } else { prefix };
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{prefix}-{}-{}.{}",
        now.format("%Y%m%d-%H%M%S"),
        &suffix[..8],
        extension.trim_start_matches('.')
    )
}

fn sanitize(prefix: &str) -> String {
    prefix
        .trim()
        .chars()
        .map(|c| if c == '/' || c == ':' || c.is_whitespace() { '_' } else { c })
        .collect()
}

/// File extension for a MIME type.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/mp4" => "m4a",
        "audio/mulaw" => "mulaw",
        "audio/alaw" => "alaw",
        "audio/pcm" => "pcm",
        _ => "bin",
    }
}

/// MIME type guessed from a file name.
pub fn mime_for_path(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_filename_shape() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let name = generate_filename("veo video/clip:1", "mp4", now);
        assert!(name.starts_with("veo_video_clip_1-20250102-030405-"));
        assert!(name.ends_with(".mp4"));
        let suffix = name
            .trim_start_matches("veo_video_clip_1-20250102-030405-")
            .trim_end_matches(".mp4");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_filename_unique() {
        let now = Utc::now();
        assert_ne!(generate_filename("a", "png", now), generate_filename("a", "png", now));
    }

    #[test]
    fn test_mime_tables() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/x-thing"), "bin");
        assert_eq!(mime_for_path("gs://b/cat.JPEG"), Some("image/jpeg"));
        assert_eq!(mime_for_path("noext"), None);
    }
}

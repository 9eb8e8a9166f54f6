use chrono::{DateTime, Utc};
use rand::RngCore;
use std::path::Path;

/// Extension used when the source file has none
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Lowercased extension of a local file, or `DEFAULT_EXTENSION`
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Collision-resistant object name: `{timestamp}-{random}.{ext}`
pub fn generate_object_name(path: &Path) -> String {
    generate_object_name_at(Utc::now(), &extension_of(path))
}

pub fn generate_object_name_at(now: DateTime<Utc>, extension: &str) -> String {
    let mut token = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut token);
    format!(
        "{}-{}.{}",
        now.format("%Y%m%dT%H%M%S"),
        hex::encode(token),
        extension
    )
}

/// Makes a caller-supplied blob name safe to embed in a URL path segment
pub fn sanitize_object_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = sanitized.trim_start_matches('.');
    if trimmed.is_empty() {
        generate_object_name_at(Utc::now(), DEFAULT_EXTENSION)
    } else {
        trimmed.chars().take(255).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("/tmp/IMG_0001.JPG")), "jpg");
        assert_eq!(extension_of(Path::new("photo.heic")), "heic");
        assert_eq!(extension_of(Path::new("no_extension")), "jpg");
    }

    #[test]
    fn test_generated_name_shape() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let name = generate_object_name_at(now, "png");
        assert!(name.starts_with("20250314T092653-"));
        assert!(name.ends_with(".png"));
        // timestamp(15) + '-' + 16 hex + ".png"
        assert_eq!(name.len(), 15 + 1 + 16 + 4);
    }

    #[test]
    fn test_generated_names_do_not_collide() {
        let now = Utc::now();
        let names: HashSet<String> = (0..500)
            .map(|_| generate_object_name_at(now, "jpg"))
            .collect();
        assert_eq!(names.len(), 500);
    }

    #[test]
    fn test_sanitize_object_name() {
        assert_eq!(sanitize_object_name("beach day.jpg"), "beach_day.jpg");
        assert_eq!(sanitize_object_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_object_name("a?b#c.png"), "a_b_c.png");
        assert!(sanitize_object_name("...").ends_with(".jpg"));
    }
}

use serde_json::{Map, Value};

/// EXIF tags worth keeping on a media record
const KEPT_TAGS: &[&str] = &[
    "DateTime",
    "DateTimeOriginal",
    "Make",
    "Model",
    "Orientation",
    "FNumber",
    "ExposureTime",
    "PhotographicSensitivity",
    "FocalLength",
    "GPSLatitude",
    "GPSLatitudeRef",
    "GPSLongitude",
    "GPSLongitudeRef",
    "GPSAltitude",
    "PixelXDimension",
    "PixelYDimension",
];

pub struct MetadataService;

impl MetadataService {
    /// Media category stored in the record's `file_type` column
    pub fn media_category(mime_type: &str) -> &'static str {
        let Ok(parsed) = mime_type.parse::<mime::Mime>() else {
            return "other";
        };
        match parsed.type_() {
            mime::IMAGE => "image",
            mime::VIDEO => "video",
            _ => "other",
        }
    }

    /// MIME type from magic bytes, falling back to octet-stream
    pub fn detect_mime(bytes: &[u8]) -> &'static str {
        infer::get(bytes)
            .map(|k| k.mime_type())
            .unwrap_or("application/octet-stream")
    }

    /// Reads EXIF fields from an image container. Returns `None` when the
    /// file carries no EXIF block.
    pub fn extract_exif(bytes: &[u8]) -> Option<Map<String, Value>> {
        let exif = exif::Reader::new()
            .read_from_container(&mut std::io::Cursor::new(bytes))
            .ok()?;

        let mut map = Map::new();
        for field in exif.fields() {
            if field.ifd_num != exif::In::PRIMARY {
                continue;
            }
            let key = field.tag.to_string();
            if KEPT_TAGS.contains(&key.as_str()) {
                let value = field.display_value().with_unit(&exif).to_string();
                map.insert(key, Value::String(value.trim_matches('"').to_string()));
            }
        }

        tracing::debug!("Extracted {} EXIF fields", map.len());
        if map.is_empty() { None } else { Some(map) }
    }
}

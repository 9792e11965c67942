use uuid::Uuid;

/// Per-image URL manifest supplied by the metadata-fetching collaborator.
///
/// The upstream image service exposes a fixed ladder of pre-rendered
/// resolutions, each optionally paired with a next-gen-codec variant.
/// Absent tier URLs fall back to `original_url` during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    /// Opaque logical-image identity.
    pub id: Uuid,
    /// Full-resolution upload; always present, the fallback of last resort.
    pub original_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub small_url: Option<String>,
    #[serde(default)]
    pub regular_url: Option<String>,
    /// Next-gen-codec variants, preferred over the legacy encodes above.
    #[serde(default)]
    pub thumbnail_alt_format_url: Option<String>,
    #[serde(default)]
    pub small_alt_format_url: Option<String>,
    #[serde(default)]
    pub regular_alt_format_url: Option<String>,
    #[serde(default)]
    pub original_alt_format_url: Option<String>,
}

impl ImageManifest {
    /// Manifest with only an original URL, no tier ladder.
    pub fn original_only(id: Uuid, original_url: impl Into<String>) -> Self {
        Self {
            id,
            original_url: original_url.into(),
            thumbnail_url: None,
            small_url: None,
            regular_url: None,
            thumbnail_alt_format_url: None,
            small_alt_format_url: None,
            regular_alt_format_url: None,
            original_alt_format_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ImageManifest;
    use uuid::Uuid;

    #[test]
    fn deserializes_camel_case_with_absent_tiers() {
        let id = Uuid::now_v7();
        let json = format!(
            r#"{{
                "id": "{id}",
                "originalUrl": "https://img.example/a/full.jpg",
                "smallUrl": "https://img.example/a/small.jpg",
                "smallAltFormatUrl": "https://img.example/a/small.webp"
            }}"#
        );

        let manifest: ImageManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest.id, id);
        assert_eq!(manifest.original_url, "https://img.example/a/full.jpg");
        assert_eq!(
            manifest.small_alt_format_url.as_deref(),
            Some("https://img.example/a/small.webp")
        );
        assert!(manifest.thumbnail_url.is_none());
        assert!(manifest.regular_url.is_none());
    }
}

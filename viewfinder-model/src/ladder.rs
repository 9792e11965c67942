use std::sync::Arc;

use url::Url;
use uuid::Uuid;

use crate::identifier::ResourceUrl;
use crate::manifest::ImageManifest;
use crate::tier::{Tier, WidthDescriptor};

/// Resolved tier ladder for one logical image.
///
/// Construction is the single place format- and tier-fallback policy lives:
/// [`TierLadder::candidates`] yields the concrete URLs to attempt for a
/// tier, best format first, and every call site shares that one ordering.
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct TierLadder {
    id: Uuid,
    animated: bool,
    original: ResourceUrl,
    original_alt: Option<ResourceUrl>,
    legacy: [Option<ResourceUrl>; 3],
    alt: [Option<ResourceUrl>; 3],
    descriptors: Arc<[WidthDescriptor]>,
}

/// File extensions whose intermediate re-encodes would destroy animation.
const ANIMATED_EXTENSIONS: [&str; 2] = ["gif", "apng"];

fn is_animated_url(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => url.to_ascii_lowercase(),
    };
    ANIMATED_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(&format!(".{ext}")))
}

// Index into the per-tier slots; Original is stored separately.
fn slot_index(tier: Tier) -> Option<usize> {
    match tier {
        Tier::Thumbnail => Some(0),
        Tier::Small => Some(1),
        Tier::Regular => Some(2),
        Tier::Original => None,
    }
}

impl TierLadder {
    /// Resolve a manifest into an immutable ladder.
    ///
    /// Animated sources are detected once here; their ladder collapses to
    /// the original URL because the upstream service cannot re-encode them
    /// without dropping frames.
    pub fn from_manifest(manifest: &ImageManifest) -> Self {
        let to_url = |s: &Option<String>| {
            s.as_deref().map(ResourceUrl::from)
        };

        let animated = is_animated_url(&manifest.original_url);
        let original = ResourceUrl::from(manifest.original_url.as_str());

        let legacy = [
            to_url(&manifest.thumbnail_url),
            to_url(&manifest.small_url),
            to_url(&manifest.regular_url),
        ];
        let alt = [
            to_url(&manifest.thumbnail_alt_format_url),
            to_url(&manifest.small_alt_format_url),
            to_url(&manifest.regular_alt_format_url),
        ];

        let mut descriptors = Vec::new();
        if !animated {
            for (idx, tier) in
                [Tier::Thumbnail, Tier::Small, Tier::Regular]
                    .into_iter()
                    .enumerate()
            {
                // Same format preference as `candidates`: alt first.
                let best = alt[idx].as_ref().or(legacy[idx].as_ref());
                if let (Some(url), Some(width)) = (best, tier.width_hint()) {
                    descriptors.push(WidthDescriptor {
                        url: url.clone(),
                        width,
                    });
                }
            }
        }
        let descriptors: Arc<[WidthDescriptor]> = Arc::from(descriptors);

        Self {
            id: manifest.id,
            animated,
            original,
            original_alt: to_url(&manifest.original_alt_format_url),
            legacy,
            alt,
            descriptors,
        }
    }

    /// Logical-image identity this ladder was resolved from.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the source is animated and the ladder is collapsed.
    pub fn is_animated(&self) -> bool {
        self.animated
    }

    /// Full-resolution fallback of last resort.
    pub fn original(&self) -> &ResourceUrl {
        &self.original
    }

    /// The tier a fresh load starts from.
    pub fn first_tier(&self) -> Tier {
        if self.animated {
            Tier::Original
        } else {
            Tier::Thumbnail
        }
    }

    /// Responsive width manifest for the render surface.
    pub fn width_descriptors(&self) -> Arc<[WidthDescriptor]> {
        Arc::clone(&self.descriptors)
    }

    fn tier_url(&self, tier: Tier) -> ResourceUrl {
        // Absent tier URLs fall back to the original upload.
        slot_index(tier)
            .and_then(|idx| self.legacy[idx].clone())
            .unwrap_or_else(|| self.original.clone())
    }

    fn alt_url(&self, tier: Tier) -> Option<ResourceUrl> {
        match slot_index(tier) {
            Some(idx) => self.alt[idx].clone(),
            None => self.original_alt.clone(),
        }
    }

    /// Ordered candidate list for one tier, best format first:
    /// next-gen codec at the tier, legacy codec at the tier, next-gen codec
    /// one tier down as a graceful fallback, then the original upload.
    /// Duplicates (from tier-URL fallback) are collapsed, order preserved.
    pub fn candidates(&self, tier: Tier) -> Vec<ResourceUrl> {
        if self.animated {
            return vec![self.original.clone()];
        }

        let mut out: Vec<ResourceUrl> = Vec::with_capacity(4);
        let mut push = |url: ResourceUrl, out: &mut Vec<ResourceUrl>| {
            if !out.contains(&url) {
                out.push(url);
            }
        };

        if let Some(alt) = self.alt_url(tier) {
            push(alt, &mut out);
        }
        push(self.tier_url(tier), &mut out);
        if let Some(prev_alt) = tier.previous().and_then(|p| self.alt_url(p)) {
            push(prev_alt, &mut out);
        }
        push(self.original.clone(), &mut out);

        out
    }
}

#[cfg(test)]
mod tests {
    use super::TierLadder;
    use crate::manifest::ImageManifest;
    use crate::tier::Tier;
    use uuid::Uuid;

    fn full_manifest() -> ImageManifest {
        ImageManifest {
            id: Uuid::now_v7(),
            original_url: "https://img.example/x/full.jpg".into(),
            thumbnail_url: Some("https://img.example/x/thumb.jpg".into()),
            small_url: Some("https://img.example/x/small.jpg".into()),
            regular_url: Some("https://img.example/x/regular.jpg".into()),
            thumbnail_alt_format_url: Some(
                "https://img.example/x/thumb.webp".into(),
            ),
            small_alt_format_url: Some(
                "https://img.example/x/small.webp".into(),
            ),
            regular_alt_format_url: Some(
                "https://img.example/x/regular.webp".into(),
            ),
            original_alt_format_url: Some(
                "https://img.example/x/full.webp".into(),
            ),
        }
    }

    #[test]
    fn candidates_prefer_alt_then_legacy_then_prev_alt_then_original() {
        let ladder = TierLadder::from_manifest(&full_manifest());
        let candidates = ladder.candidates(Tier::Small);
        let urls: Vec<&str> =
            candidates.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://img.example/x/small.webp",
                "https://img.example/x/small.jpg",
                "https://img.example/x/thumb.webp",
                "https://img.example/x/full.jpg",
            ]
        );
    }

    #[test]
    fn absent_tier_urls_fall_back_to_original_without_duplicates() {
        let manifest = ImageManifest::original_only(
            Uuid::now_v7(),
            "https://img.example/y/full.jpg",
        );
        let ladder = TierLadder::from_manifest(&manifest);

        let candidates = ladder.candidates(Tier::Regular);
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].as_str(),
            "https://img.example/y/full.jpg"
        );
    }

    #[test]
    fn animated_source_collapses_ladder_to_original() {
        let mut manifest = full_manifest();
        manifest.original_url = "https://img.example/x/loop.GIF".into();
        let ladder = TierLadder::from_manifest(&manifest);

        assert!(ladder.is_animated());
        assert_eq!(ladder.first_tier(), Tier::Original);
        for tier in Tier::LADDER {
            let candidates = ladder.candidates(tier);
            assert_eq!(candidates.len(), 1);
            assert_eq!(
                candidates[0].as_str(),
                "https://img.example/x/loop.GIF"
            );
        }
        assert!(ladder.width_descriptors().is_empty());
    }

    #[test]
    fn animated_detection_ignores_query_strings() {
        let mut manifest = full_manifest();
        manifest.original_url =
            "https://img.example/x/photo.jpg?dl=clip.gif".into();
        let ladder = TierLadder::from_manifest(&manifest);
        assert!(!ladder.is_animated());
    }

    #[test]
    fn width_descriptors_cover_hinted_tiers_in_order() {
        let ladder = TierLadder::from_manifest(&full_manifest());
        let descriptors = ladder.width_descriptors();
        let widths: Vec<u32> = descriptors.iter().map(|d| d.width).collect();
        assert_eq!(widths, vec![200, 400, 1080]);

        // Each rung carries the same best format `candidates` would try
        // first for its tier.
        let urls: Vec<&str> =
            descriptors.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://img.example/x/thumb.webp",
                "https://img.example/x/small.webp",
                "https://img.example/x/regular.webp",
            ]
        );
    }

    #[test]
    fn original_tier_prefers_alt_format() {
        let ladder = TierLadder::from_manifest(&full_manifest());
        let candidates = ladder.candidates(Tier::Original);
        assert_eq!(
            candidates[0].as_str(),
            "https://img.example/x/full.webp"
        );
        assert_eq!(
            candidates.last().unwrap().as_str(),
            "https://img.example/x/full.jpg"
        );
    }
}

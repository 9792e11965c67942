use std::fmt::Display;
use std::fmt::Formatter;

use crate::identifier::ResourceUrl;

/// Quality tiers of a gallery image, ascending.
///
/// These are the rungs the upstream image service has already rendered;
/// the client only consumes them. Widths are the service's fixed output
/// sizes, used as hints for responsive resource selection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// 200px width - grid placeholder
    Thumbnail,
    /// 400px width - small preview
    Small,
    /// 1080px width - standard display quality (default target)
    #[default]
    Regular,
    /// Full-resolution upload
    Original,
}

impl Tier {
    /// All tiers in ascending quality order.
    pub const LADDER: [Tier; 4] =
        [Self::Thumbnail, Self::Small, Self::Regular, Self::Original];

    /// Pixel-width hint for this tier, if the upstream ladder fixes one.
    pub const fn width_hint(&self) -> Option<u32> {
        match self {
            Self::Thumbnail => Some(200),
            Self::Small => Some(400),
            Self::Regular => Some(1080),
            Self::Original => None,
        }
    }

    /// Position in the ladder (higher is better quality).
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Thumbnail => 0,
            Self::Small => 1,
            Self::Regular => 2,
            Self::Original => 3,
        }
    }

    /// The next rung up, or `None` at the top of the ladder.
    pub const fn next(&self) -> Option<Tier> {
        match self {
            Self::Thumbnail => Some(Self::Small),
            Self::Small => Some(Self::Regular),
            Self::Regular => Some(Self::Original),
            Self::Original => None,
        }
    }

    /// The next rung down, or `None` at the bottom of the ladder.
    pub const fn previous(&self) -> Option<Tier> {
        match self {
            Self::Thumbnail => None,
            Self::Small => Some(Self::Thumbnail),
            Self::Regular => Some(Self::Small),
            Self::Original => Some(Self::Regular),
        }
    }

    /// URL-safe string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnail",
            Self::Small => "small",
            Self::Regular => "regular",
            Self::Original => "original",
        }
    }
}

impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thumbnail => write!(f, "thumbnail (200px)"),
            Self::Small => write!(f, "small (400px)"),
            Self::Regular => write!(f, "regular (1080px)"),
            Self::Original => write!(f, "original"),
        }
    }
}

/// One rung of the responsive width manifest handed to the render surface.
///
/// The surface forwards these to the platform's own resource selection
/// (`srcset`-style) instead of hand-rolling breakpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidthDescriptor {
    /// Concrete resource for this rung.
    pub url: ResourceUrl,
    /// Pixel-width hint.
    pub width: u32,
}

#[cfg(test)]
mod tests {
    use super::Tier;

    #[test]
    fn ladder_is_ascending_by_rank() {
        let ranks: Vec<u8> = Tier::LADDER.iter().map(|t| t.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn next_walks_the_full_ladder() {
        let mut tier = Tier::Thumbnail;
        let mut seen = vec![tier];
        while let Some(next) = tier.next() {
            seen.push(next);
            tier = next;
        }
        assert_eq!(seen, Tier::LADDER.to_vec());
    }

    #[test]
    fn width_hints_increase_up_the_ladder() {
        assert!(
            Tier::Thumbnail.width_hint().unwrap()
                < Tier::Small.width_hint().unwrap()
        );
        assert!(
            Tier::Small.width_hint().unwrap()
                < Tier::Regular.width_hint().unwrap()
        );
        assert_eq!(Tier::Original.width_hint(), None);
    }
}

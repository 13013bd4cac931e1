//! The fixed highlight palette.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A palette entry. Unrecognized tokens fall back to [`HighlightColor::Yellow`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Pink,
    Orange,
}

impl HighlightColor {
    pub const ALL: [HighlightColor; 5] = [
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Blue,
        HighlightColor::Pink,
        HighlightColor::Orange,
    ];

    /// Palette token as used on the wire and in `data-highlight-color`.
    pub fn name(self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Green => "green",
            HighlightColor::Blue => "blue",
            HighlightColor::Pink => "pink",
            HighlightColor::Orange => "orange",
        }
    }

    /// CSS background color.
    pub fn hex(self) -> &'static str {
        match self {
            HighlightColor::Yellow => "#ffeb3b",
            HighlightColor::Green => "#4caf50",
            HighlightColor::Blue => "#2196f3",
            HighlightColor::Pink => "#e91e63",
            HighlightColor::Orange => "#ff9800",
        }
    }

    /// Parse a palette token, degrading to the default for anything unknown.
    pub fn from_token(token: &str) -> Self {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|color| color.name().eq_ignore_ascii_case(token))
            .unwrap_or_else(|| {
                tracing::debug!(token, "unknown highlight color, using default");
                Self::default()
            })
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for HighlightColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for HighlightColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(Self::from_token(&token))
    }
}

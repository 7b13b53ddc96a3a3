use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Visual treatment applied to every face in one annotation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStyle {
    /// Green rectangle stroked around the face.
    #[default]
    Outline,
    /// Decorative image stretched over the face.
    Stamp,
    /// Placeholder style; renders the stamp image.
    Mosaic,
}

impl MarkerStyle {
    pub const ALL: &[MarkerStyle] = &[MarkerStyle::Outline, MarkerStyle::Stamp, MarkerStyle::Mosaic];

    /// Whether this style draws the stamp image and therefore needs it loaded.
    pub fn uses_stamp(self) -> bool {
        matches!(self, MarkerStyle::Stamp | MarkerStyle::Mosaic)
    }

    /// The style after this one, wrapping around.
    pub fn next(self) -> Self {
        match self {
            MarkerStyle::Outline => MarkerStyle::Stamp,
            MarkerStyle::Stamp => MarkerStyle::Mosaic,
            MarkerStyle::Mosaic => MarkerStyle::Outline,
        }
    }
}

impl fmt::Display for MarkerStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerStyle::Outline => write!(f, "outline"),
            MarkerStyle::Stamp => write!(f, "stamp"),
            MarkerStyle::Mosaic => write!(f, "mosaic"),
        }
    }
}

impl FromStr for MarkerStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "outline" | "rect" => Ok(MarkerStyle::Outline),
            "stamp" => Ok(MarkerStyle::Stamp),
            "mosaic" => Ok(MarkerStyle::Mosaic),
            other => Err(format!(
                "marker style must be one of: outline, stamp, mosaic, got '{other}'"
            )),
        }
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a finished frame must be turned for display.
///
/// `Left` means the stored pixels are the intended picture rotated 90°
/// clockwise, so presentation turns them 90° counter-clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

impl Orientation {
    pub const ALL: &[Orientation] = &[
        Orientation::Up,
        Orientation::Down,
        Orientation::Left,
        Orientation::Right,
    ];

    /// Display orientation for frames captured while the device is held in
    /// `device`. `None` when the device orientation is unknown.
    pub fn from_device(device: DeviceOrientation) -> Option<Self> {
        match device {
            DeviceOrientation::Unknown => None,
            DeviceOrientation::Portrait => Some(Orientation::Up),
            DeviceOrientation::PortraitUpsideDown => Some(Orientation::Down),
            DeviceOrientation::LandscapeLeft => Some(Orientation::Left),
            DeviceOrientation::LandscapeRight => Some(Orientation::Right),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Up => write!(f, "up"),
            Orientation::Down => write!(f, "down"),
            Orientation::Left => write!(f, "left"),
            Orientation::Right => write!(f, "right"),
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Orientation::Up),
            "down" => Ok(Orientation::Down),
            "left" => Ok(Orientation::Left),
            "right" => Ok(Orientation::Right),
            other => Err(format!(
                "orientation must be one of: up, down, left, right, got '{other}'"
            )),
        }
    }
}

/// Physical orientation reported by the device holding the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOrientation {
    Unknown,
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl FromStr for DeviceOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "unknown" => Ok(DeviceOrientation::Unknown),
            "portrait" => Ok(DeviceOrientation::Portrait),
            "portrait_upside_down" => Ok(DeviceOrientation::PortraitUpsideDown),
            "landscape_left" => Ok(DeviceOrientation::LandscapeLeft),
            "landscape_right" => Ok(DeviceOrientation::LandscapeRight),
            other => Err(format!(
                "device orientation must be one of: portrait, portrait-upside-down, \
                 landscape-left, landscape-right, unknown, got '{other}'"
            )),
        }
    }
}

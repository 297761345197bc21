//! Host-side tunables for the interactive crop flow.

use std::time::Duration;

use cutout_pipeline::RasterConfig;
use serde::{Deserialize, Serialize};

/// Serde helpers for `Duration` fields as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Settings shared by the crop node and its callback handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// How long the node waits for the user before passing the input
    /// through unchanged (seconds).
    #[serde(with = "duration_serde")]
    pub wait_timeout: Duration,

    /// Age after which an abandoned session is purged from the store
    /// (seconds).
    #[serde(with = "duration_serde")]
    pub session_ttl: Duration,

    /// Outline vertices beyond this count are dropped.
    pub max_path_points: usize,

    /// Rasterizer settings.
    pub raster: RasterConfig,

    /// Longest edge of the preview sent to the UI, in pixels.
    pub preview_max_edge: u32,

    /// Images with more pixels than this log a warning; drawing canvases
    /// with more pixels than this are rejected.
    pub oversize_pixels: u64,
}

impl HostConfig {
    /// Default wait for the user.
    pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
    /// Default lifetime of an abandoned session.
    pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(300);
    /// Default cap on outline vertices.
    pub const DEFAULT_MAX_PATH_POINTS: usize = 2000;
    /// Default preview edge.
    pub const DEFAULT_PREVIEW_MAX_EDGE: u32 = 1024;
    /// Default oversize warning threshold (4096 × 4096).
    pub const DEFAULT_OVERSIZE_PIXELS: u64 = 4096 * 4096;
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Self::DEFAULT_WAIT_TIMEOUT,
            session_ttl: Self::DEFAULT_SESSION_TTL,
            max_path_points: Self::DEFAULT_MAX_PATH_POINTS,
            raster: RasterConfig::default(),
            preview_max_edge: Self::DEFAULT_PREVIEW_MAX_EDGE,
            oversize_pixels: Self::DEFAULT_OVERSIZE_PIXELS,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HostConfig::default();
        assert_eq!(config.wait_timeout, Duration::from_secs(60));
        assert_eq!(config.max_path_points, 2000);
        assert_eq!(config.raster.supersample, 4);
        assert_eq!(config.preview_max_edge, 1024);
    }

    #[test]
    fn durations_round_trip_as_seconds() {
        let json = serde_json::to_value(HostConfig::default()).unwrap();
        assert_eq!(json["wait_timeout"], 60.0);
        assert_eq!(json["session_ttl"], 300.0);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: HostConfig = serde_json::from_str(r#"{"wait_timeout": 0.25}"#).unwrap();
        assert_eq!(config.wait_timeout, Duration::from_millis(250));
        assert_eq!(config.session_ttl, HostConfig::DEFAULT_SESSION_TTL);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let result: Result<HostConfig, _> = serde_json::from_str(r#"{"session_ttl": -1}"#);
        assert!(result.is_err());
    }
}

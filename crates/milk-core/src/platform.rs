//! Native wrapper detection and the picture capture sources it enables.

use serde::{Deserialize, Serialize};

/// User-agent markers left by native webview shells.
const NATIVE_USER_AGENT_MARKERS: [&str; 2] = ["Capacitor", "; wv)"];

/// Everything the host exposes about where the client runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSignals {
    /// The native bridge itself reported a native platform.
    #[serde(default)]
    pub bridge_reports_native: bool,
    /// Platform name reported by the bridge (`ios`, `android`, `web`).
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// A native bridge object is injected into the page.
    #[serde(default)]
    pub has_native_bridge_object: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Native,
    Web,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    Camera,
    Gallery,
    FilePicker,
}

impl CaptureSource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Camera => "Take photo",
            Self::Gallery => "Choose from gallery",
            Self::FilePicker => "Upload file",
        }
    }
}

impl PlatformSignals {
    /// Native when any one signal says so.
    pub fn is_native(&self) -> bool {
        self.bridge_reports_native
            || self.platform_is_mobile()
            || self.user_agent_is_native_webview()
            || self.has_native_bridge_object
    }

    pub fn platform(&self) -> Platform {
        if self.is_native() {
            Platform::Native
        } else {
            Platform::Web
        }
    }

    /// Picture sources offered to the user.
    pub fn capture_sources(&self) -> Vec<CaptureSource> {
        match self.platform() {
            Platform::Native => vec![CaptureSource::Camera, CaptureSource::Gallery],
            Platform::Web => vec![CaptureSource::FilePicker],
        }
    }

    fn platform_is_mobile(&self) -> bool {
        self.platform.as_deref().is_some_and(|platform| {
            let platform = platform.trim();
            platform.eq_ignore_ascii_case("ios") || platform.eq_ignore_ascii_case("android")
        })
    }

    fn user_agent_is_native_webview(&self) -> bool {
        self.user_agent.as_deref().is_some_and(|agent| {
            NATIVE_USER_AGENT_MARKERS
                .iter()
                .any(|marker| agent.contains(marker))
        })
    }
}

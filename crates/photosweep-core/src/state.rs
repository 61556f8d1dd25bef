//! Published pipeline state and permission guidance.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::Phase;

/// Photo library authorization status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
    /// Access to a user-selected subset of the library.
    Limited,
}

impl AuthorizationStatus {
    /// Check if the pipeline may run with this status.
    pub fn allows_scan(self) -> bool {
        matches!(self, Self::Authorized | Self::Limited)
    }
}

/// Action offered alongside permission guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceAction {
    Dismiss,
    OpenSettings,
}

impl GuidanceAction {
    /// Button label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Dismiss => "Not Now",
            Self::OpenSettings => "Open Settings",
        }
    }
}

/// Status-specific explanation shown when the scan cannot proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGuidance {
    pub status: AuthorizationStatus,
    pub title: String,
    pub body: String,
    pub actions: Vec<GuidanceAction>,
}

impl PermissionGuidance {
    /// Build guidance for a status.
    ///
    /// Limited access still gets guidance (to upsell full access), even
    /// though the scan proceeds.
    pub fn for_status(status: AuthorizationStatus) -> Option<Self> {
        let (title, body) = match status {
            AuthorizationStatus::Authorized => return None,
            AuthorizationStatus::Denied => (
                "Unlock Full PR",
                "We need access to your photos to detect duplicates, large files, and blurry \
                 shots. Enable photo access in Settings and start freeing up space now!",
            ),
            AuthorizationStatus::Restricted => (
                "Photo Access Restricted",
                "Photo access is blocked by system or parental controls. Without it, we can't \
                 analyze your library or help you reclaim storage space.",
            ),
            AuthorizationStatus::Limited => (
                "Get Maximum Space Savings",
                "Currently only a few photos are accessible. Grant access to your entire library \
                 in Settings to clean up faster and reclaim the most storage.",
            ),
            AuthorizationStatus::NotDetermined => (
                "Photo Access Needed",
                "Enable photo access in Settings to scan your library, remove clutter, and \
                 instantly free up valuable space.",
            ),
        };
        Some(Self {
            status,
            title: title.to_string(),
            body: body.to_string(),
            actions: vec![GuidanceAction::Dismiss, GuidanceAction::OpenSettings],
        })
    }
}

/// Lifecycle state of the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum PipelineState {
    RequestingPermission,
    PermissionDenied(PermissionGuidance),
    Loading,
    #[default]
    Idle,
    Error(String),
}

impl PipelineState {
    /// Check if a scan is running.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Position of a running phase, for progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub phase: Phase,
    /// Index of the segment just completed.
    pub segment: usize,
    pub segment_count: usize,
}

impl PhaseProgress {
    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.segment_count == 0 {
            return 1.0;
        }
        ((self.segment + 1) as f64 / self.segment_count as f64).min(1.0)
    }
}

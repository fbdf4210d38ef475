//! Serializable batch settings.
//!
//! [`BatchSettings`] captures every tunable of a batch run in a format that
//! can be stored as JSON next to the records it applies to.
//!
//! # Example
//!
//! ```
//! use cardpress::{BatchSettings, FailurePolicy};
//!
//! let settings = BatchSettings::new("Lions Club")
//!     .with_failure_policy(FailurePolicy::SkipAndReport)
//!     .with_oversampling(2.0);
//!
//! let json = settings.to_json().unwrap();
//! let restored = BatchSettings::from_json(&json).unwrap();
//! assert_eq!(restored, settings);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_ASSET_TIMEOUT_MS, DEFAULT_SETTLE_DELAY_MS, MAX_OVERSAMPLING};
use crate::layout::LayoutPolicy;
use crate::render::clamp_oversampling;

/// What happens when a single card cannot be rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the batch; nothing is persisted.
    #[default]
    Abort,
    /// Leave the record out, keep its slot free for the next card and list
    /// it in the outcome.
    SkipAndReport,
}

fn default_true() -> bool {
    true
}

fn default_asset_timeout_ms() -> u64 {
    DEFAULT_ASSET_TIMEOUT_MS
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn saturating_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_oversampling() -> f32 {
    MAX_OVERSAMPLING
}

/// All batch tunables.
///
/// # JSON Format
///
/// ```json
/// {
///   "organizationName": "Lions Club",
///   "assetTimeoutMs": 3000,
///   "settleDelayMs": 40,
///   "oversampling": 3.0,
///   "cropMarks": true,
///   "failurePolicy": "abort",
///   "loadSystemFonts": true
/// }
/// ```
///
/// Every field is optional when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSettings {
    /// Printed in every card header.
    #[serde(default)]
    pub organization_name: String,

    /// Ceiling for each asset load.
    #[serde(default = "default_asset_timeout_ms")]
    pub asset_timeout_ms: u64,

    /// Pause before each capture.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Physical pixels per logical pixel, clamped to `[2, 3]` on use.
    #[serde(default = "default_oversampling")]
    pub oversampling: f32,

    /// Draw crop marks on sheet formats.
    #[serde(default = "default_true")]
    pub crop_marks: bool,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Load system fonts into the render surface. Without fonts, card
    /// text is not drawn.
    #[serde(default = "default_true")]
    pub load_system_fonts: bool,

    /// Custom card size and spacing. `None` means CR80 defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutPolicy>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            organization_name: String::new(),
            asset_timeout_ms: DEFAULT_ASSET_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            oversampling: MAX_OVERSAMPLING,
            crop_marks: true,
            failure_policy: FailurePolicy::Abort,
            load_system_fonts: true,
            layout: None,
        }
    }
}

impl BatchSettings {
    /// Default settings for `organization_name`.
    pub fn new(organization_name: impl Into<String>) -> Self {
        Self {
            organization_name: organization_name.into(),
            ..Self::default()
        }
    }

    pub fn with_asset_timeout(mut self, timeout: Duration) -> Self {
        self.asset_timeout_ms = saturating_ms(timeout);
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = saturating_ms(delay);
        self
    }

    pub fn with_oversampling(mut self, factor: f32) -> Self {
        self.oversampling = factor;
        self
    }

    pub fn with_crop_marks(mut self, enabled: bool) -> Self {
        self.crop_marks = enabled;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_system_fonts(mut self, enabled: bool) -> Self {
        self.load_system_fonts = enabled;
        self
    }

    pub fn with_layout(mut self, layout: LayoutPolicy) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_millis(self.asset_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Oversampling clamped to the supported range.
    pub fn effective_oversampling(&self) -> f32 {
        clamp_oversampling(self.oversampling)
    }

    /// The layout policy in effect.
    pub fn layout_policy(&self) -> LayoutPolicy {
        self.layout.unwrap_or_default()
    }

    /// Serializes the settings to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serializes the settings to a pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Rotation settings, parsed and validated once before any provider call.

use snaprot_common::{Result, RotatorError};
use std::path::PathBuf;
use std::str::FromStr;

pub const RETAIN_VAR: &str = "SNAPS_TO_RETAIN";
/// Lower-case spelling, also accepted.
pub const RETAIN_VAR_LEGACY: &str = "snaps_to_retain";
pub const TAG_KEY_VAR: &str = "SNAPROT_TAG_KEY";
pub const ROOT_DEVICE_VAR: &str = "SNAPROT_ROOT_DEVICE";
pub const DRY_RUN_VAR: &str = "SNAPROT_DRY_RUN";
pub const ON_VOLUME_ERROR_VAR: &str = "SNAPROT_ON_VOLUME_ERROR";
pub const PROVIDER_VAR: &str = "SNAPROT_PROVIDER";
pub const MEMORY_FIXTURE_VAR: &str = "SNAPROT_MEMORY_FIXTURE";
pub const REGION_VAR: &str = "SNAPROT_REGION";

pub const DEFAULT_TAG_KEY: &str = "BackMeUp";

/// Number of snapshots kept per volume. Zero is valid and keeps nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RetentionCount(usize);

impl RetentionCount {
    pub fn new(count: usize) -> Self {
        Self(count)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl FromStr for RetentionCount {
    type Err = RotatorError;

    fn from_str(raw: &str) -> Result<Self> {
        let value: i64 = raw.trim().parse().map_err(|_| {
            RotatorError::Config(format!("{RETAIN_VAR} must be an integer, got {raw:?}"))
        })?;

        if value < 0 {
            return Err(RotatorError::Config(format!(
                "{RETAIN_VAR} must not be negative, got {value}"
            )));
        }

        usize::try_from(value)
            .map(Self)
            .map_err(|_| RotatorError::Config(format!("{RETAIN_VAR} is out of range: {value}")))
    }
}

/// What a pass does after one volume fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnVolumeError {
    /// Stop the pass and return the error.
    #[default]
    Abort,
    /// Record the failure and move on to the next volume.
    Continue,
}

impl FromStr for OnVolumeError {
    type Err = RotatorError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(RotatorError::Config(format!(
                "{ON_VOLUME_ERROR_VAR} must be 'abort' or 'continue', got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Ec2,
    Memory,
}

impl FromStr for ProviderKind {
    type Err = RotatorError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ec2" | "aws" => Ok(Self::Ec2),
            "memory" => Ok(Self::Memory),
            other => Err(RotatorError::Config(format!(
                "{PROVIDER_VAR} must be 'ec2' or 'memory', got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationConfig {
    pub retain: RetentionCount,
    pub tag_key: String,
    /// Overrides the root device name each instance reports.
    pub root_device: Option<String>,
    pub dry_run: bool,
    pub on_volume_error: OnVolumeError,
    pub provider: ProviderKind,
    pub memory_fixture: Option<PathBuf>,
    pub region: Option<String>,
}

impl RotationConfig {
    pub fn new(retain: usize) -> Self {
        Self {
            retain: RetentionCount::new(retain),
            tag_key: DEFAULT_TAG_KEY.to_string(),
            root_device: None,
            dry_run: false,
            on_volume_error: OnVolumeError::default(),
            provider: ProviderKind::default(),
            memory_fixture: None,
            region: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let retain = get(RETAIN_VAR)
            .or_else(|| get(RETAIN_VAR_LEGACY))
            .ok_or_else(|| RotatorError::Config(format!("{RETAIN_VAR} is not set")))?
            .parse::<RetentionCount>()?;

        let tag_key = get(TAG_KEY_VAR)
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| DEFAULT_TAG_KEY.to_string());

        let dry_run = match get(DRY_RUN_VAR) {
            Some(raw) => parse_flag(DRY_RUN_VAR, &raw)?,
            None => false,
        };

        let on_volume_error = get(ON_VOLUME_ERROR_VAR)
            .map(|raw| raw.parse::<OnVolumeError>())
            .transpose()?
            .unwrap_or_default();

        let provider = get(PROVIDER_VAR)
            .map(|raw| raw.parse::<ProviderKind>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            retain,
            tag_key,
            root_device: get(ROOT_DEVICE_VAR).map(|v| v.trim().to_string()),
            dry_run,
            on_volume_error,
            provider,
            memory_fixture: get(MEMORY_FIXTURE_VAR).map(PathBuf::from),
            region: get(REGION_VAR).map(|v| v.trim().to_string()),
        })
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(RotatorError::Config(format!(
            "{key} must be a boolean flag, got {other:?}"
        ))),
    }
}

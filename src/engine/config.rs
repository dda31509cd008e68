//! Engine configuration.
//!
//! Defaults work on a device with no setup. A JSON file (path in `XRPHONE_CONFIG`)
//! and individual `XRPHONE_*` variables can override them.

use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, EngineResult};

pub const CONFIG_PATH_VAR: &str = "XRPHONE_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    OpenXr,
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFactorKind {
    #[default]
    HeadMounted,
    Handheld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSpaceKind {
    #[default]
    Stage,
    Local,
}

/// Where and how often poses are streamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfraConfig {
    pub endpoint: Option<String>,
    pub device_id: String,
    pub pose_rate_hz: u32,
    pub capabilities: Vec<String>,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            device_id: uuid::Uuid::new_v4().to_string(),
            pose_rate_hz: 90,
            capabilities: vec!["openxr".to_string(), "vulkan".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrConfig {
    pub app_name: String,
    pub backend: BackendKind,
    pub form_factor: FormFactorKind,
    pub reference_space: ReferenceSpaceKind,
    pub infra: InfraConfig,
}

impl Default for XrConfig {
    fn default() -> Self {
        Self {
            app_name: "xrphone".to_string(),
            backend: BackendKind::default(),
            form_factor: FormFactorKind::default(),
            reference_space: ReferenceSpaceKind::default(),
            infra: InfraConfig::default(),
        }
    }
}

impl XrConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(format!("bad config JSON: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read '{}': {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Defaults, then the file named by `XRPHONE_CONFIG`, then `XRPHONE_*` overrides.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) => Self::load(&path).unwrap_or_else(|e| {
                warn!("{}; using defaults", e);
                Self::default()
            }),
            None => Self::default(),
        };
        config.apply_overrides(lookup);
        config
    }

    /// Applies single-value overrides. Unparseable values are logged and skipped.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("XRPHONE_BACKEND") {
            match v.as_str() {
                "openxr" => self.backend = BackendKind::OpenXr,
                "mock" => self.backend = BackendKind::Mock,
                other => warn!("ignoring XRPHONE_BACKEND={}", other),
            }
        }

        if let Some(v) = lookup("XRPHONE_FORM_FACTOR") {
            match v.as_str() {
                "head_mounted" => self.form_factor = FormFactorKind::HeadMounted,
                "handheld" => self.form_factor = FormFactorKind::Handheld,
                other => warn!("ignoring XRPHONE_FORM_FACTOR={}", other),
            }
        }

        if let Some(v) = lookup("XRPHONE_REFERENCE_SPACE") {
            match v.as_str() {
                "stage" => self.reference_space = ReferenceSpaceKind::Stage,
                "local" => self.reference_space = ReferenceSpaceKind::Local,
                other => warn!("ignoring XRPHONE_REFERENCE_SPACE={}", other),
            }
        }

        if let Some(v) = lookup("XRPHONE_INFRA_ENDPOINT") {
            self.infra.endpoint = if v.is_empty() { None } else { Some(v) };
        }

        if let Some(v) = lookup("XRPHONE_DEVICE_ID") {
            if !v.is_empty() {
                self.infra.device_id = v;
            }
        }

        if let Some(v) = lookup("XRPHONE_POSE_RATE_HZ") {
            match v.parse::<u32>() {
                Ok(hz) if hz > 0 => self.infra.pose_rate_hz = hz,
                _ => warn!("ignoring XRPHONE_POSE_RATE_HZ={}", v),
            }
        }
    }
}

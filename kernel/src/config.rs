//! 驱动配置
//!
//! 编译期默认值由 build.rs 根据 Driver.toml 生成（见 [`defaults`]），
//! 运行时可以用同格式的 TOML 覆盖其中任意字段。

use std::path::Path;
use std::str::FromStr;

use log::LevelFilter;
use serde::Deserialize;
use thiserror::Error;

use crate::time::Msleep;

/// 编译期默认配置（自动生成）
pub mod defaults {
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse driver config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("`{0}` must not be empty")]
    EmptyName(&'static str),

    #[error("nminors must be at least 1")]
    NoMinors,

    #[error("minor range {first}..{first}+{count} exceeds MINORMASK")]
    MinorOverflow { first: u32, count: u32 },

    #[error("unknown log level `{0}`")]
    LogLevel(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 驱动名称，用于 chrdev 区域和 class
    pub name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: defaults::DRIVER_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// /dev 下的节点名
    pub node_name: String,
    pub first_minor: u32,
    pub nminors: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            node_name: defaults::NODE_NAME.to_string(),
            first_minor: defaults::FIRST_MINOR,
            nminors: defaults::NMINORS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// 模拟硬件读取的延迟（毫秒）
    pub delay_ms: u64,
    /// 计数器初始值
    pub initial_value: u32,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            delay_ms: defaults::DELAY_MS,
            initial_value: defaults::INITIAL_VALUE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::LOG_LEVEL.to_string(),
        }
    }
}

/// 驱动运行时配置，与 Driver.toml 的结构一致
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub general: GeneralConfig,
    pub device: DeviceConfig,
    pub hardware: HardwareConfig,
    pub debug: DebugConfig,
}

impl DriverConfig {
    /// 从 TOML 文本加载，缺省字段取编译期默认值
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.name.is_empty() {
            return Err(ConfigError::EmptyName("general.name"));
        }
        if self.device.node_name.is_empty() {
            return Err(ConfigError::EmptyName("device.node_name"));
        }
        if self.device.nminors == 0 {
            return Err(ConfigError::NoMinors);
        }

        let (first, count) = (self.device.first_minor, self.device.nminors);
        let last = first.checked_add(count - 1);
        if last.map_or(true, |last| last > crate::fs::char_dev::MINORMASK) {
            return Err(ConfigError::MinorOverflow { first, count });
        }

        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.debug.log_level)
            .map_err(|_| ConfigError::LogLevel(self.debug.log_level.clone()))
    }

    /// 配置对应的硬件延迟
    pub fn delay(&self) -> Msleep {
        Msleep::new(self.hardware.delay_ms)
    }
}

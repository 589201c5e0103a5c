//! synch_semaphore 驱动构建脚本
//!
//! 这个脚本在编译前运行，负责：
//! 1. 解析 Driver.toml 配置文件（或 menuconfig 风格的 build/.config）
//! 2. 生成默认配置常量到 OUT_DIR/config.rs
//! 3. 导出驱动名称、版本等编译期环境变量

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

/// 解析 build/.config 文件（简单 key=value 格式）
///
/// 键名形如 `device_node_name=sample_cdev`，第一个下划线之前为 section
fn parse_dot_config(content: &str) -> toml::Value {
    let mut sections: HashMap<String, HashMap<String, toml::Value>> = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        // 跳过注释和空行
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');

        let Some((section, config_key)) = key.trim().split_once('_') else {
            continue;
        };

        let parsed_value = if value == "true" {
            toml::Value::Boolean(true)
        } else if value == "false" {
            toml::Value::Boolean(false)
        } else if let Ok(int_val) = value.parse::<i64>() {
            toml::Value::Integer(int_val)
        } else {
            toml::Value::String(value.to_string())
        };

        sections
            .entry(section.to_string())
            .or_default()
            .insert(config_key.to_string(), parsed_value);
    }

    let mut root_map = toml::map::Map::new();
    for (section_name, section_data) in sections {
        let table: toml::map::Map<String, toml::Value> = section_data.into_iter().collect();
        root_map.insert(section_name, toml::Value::Table(table));
    }

    toml::Value::Table(root_map)
}

fn get_str<'a>(config: &'a toml::Value, section: &str, key: &str, default: &'a str) -> &'a str {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or(default)
}

fn get_int(config: &toml::Value, section: &str, key: &str, default: i64) -> i64 {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_integer())
        .unwrap_or(default)
}

fn main() {
    println!("cargo:rerun-if-changed=../Driver.toml");
    println!("cargo:rerun-if-changed=../build/.config");

    // 优先读取 build/.config（menuconfig 生成的配置），否则回退到 Driver.toml
    let config_content = if let Ok(content) = fs::read_to_string("../build/.config") {
        println!("cargo:warning=Using build/.config configuration");
        content
    } else {
        fs::read_to_string("../Driver.toml").unwrap_or_default()
    };

    // 判断配置文件类型：检查是否有 TOML 的 [section] 格式
    let is_toml = config_content.lines().any(|line| {
        let trimmed = line.trim();
        trimmed.starts_with('[') && trimmed.ends_with(']')
    });

    let config = if is_toml {
        toml::from_str(&config_content).expect("Driver.toml 解析失败")
    } else {
        parse_dot_config(&config_content)
    };

    let driver_name = get_str(&config, "general", "name", "synch_semaphore");
    let driver_version = get_str(&config, "general", "version", "0.1.0");

    generate_config_code(&config, driver_name, driver_version);
}

fn generate_config_code(config: &toml::Value, driver_name: &str, driver_version: &str) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR 未设置"));

    let nminors = get_int(config, "device", "nminors", 1);
    let first_minor = get_int(config, "device", "first_minor", 0);
    let delay_ms = get_int(config, "hardware", "delay_ms", 5000);
    let initial_value = get_int(config, "hardware", "initial_value", 10);

    let config_code = format!(
        r#"// synch_semaphore 驱动默认配置（自动生成）
//
// 此文件由 build.rs 根据 Driver.toml 自动生成，请勿手动修改

/// 驱动名称（chrdev 区域名与 class 名）
pub const DRIVER_NAME: &str = "{}";

/// 驱动版本
pub const DRIVER_VERSION: &str = "{}";

/// /dev 下的设备节点名
pub const NODE_NAME: &str = "{}";

/// 起始次设备号
pub const FIRST_MINOR: u32 = {};

/// 次设备号数量
pub const NMINORS: u32 = {};

/// 模拟硬件读取的延迟（毫秒）
pub const DELAY_MS: u64 = {};

/// 计数器初始值
pub const INITIAL_VALUE: u32 = {};

/// 默认日志级别
pub const LOG_LEVEL: &str = "{}";
"#,
        driver_name,
        driver_version,
        get_str(config, "device", "node_name", "sample_cdev"),
        first_minor.max(0) as u32,
        nminors.max(0) as u32,
        delay_ms.max(0) as u64,
        initial_value.max(0) as u32,
        get_str(config, "debug", "log_level", "info"),
    );

    let config_file = out_dir.join("config.rs");

    // 只有内容变化时才写入，避免每次编译都更新文件时间戳
    let existing_content = fs::read_to_string(&config_file).unwrap_or_default();
    if existing_content != config_code {
        fs::write(&config_file, &config_code).expect("写入配置文件失败");
    }
}

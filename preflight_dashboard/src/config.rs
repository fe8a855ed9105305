// preflight_dashboard/src/config.rs

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认配置文件名，位于当前工作目录
pub const DEFAULT_CONFIG_FILE: &str = "dashboard_settings.json";
/// rosbridge 网关的默认地址
pub const DEFAULT_ROSBRIDGE_URL: &str = "ws://localhost:9090";

/// rosbridge 连接配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RosbridgeConfig {
    /// 网关 WebSocket 地址
    pub url: String,
    /// 连接丢失后的固定重连间隔（单位：毫秒）
    pub reconnect_interval_ms: u64,
}

impl Default for RosbridgeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ROSBRIDGE_URL.to_string(),
            reconnect_interval_ms: 1000,
        }
    }
}

/// 话题监视器配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// 滑动窗口保留的到达时间戳个数
    pub window_size: usize,
    /// 超过该时长没有新消息即判定话题失活（单位：毫秒）
    pub liveness_timeout_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            liveness_timeout_ms: 3000,
        }
    }
}

impl MonitorConfig {
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }
}

/// 遥测仿真配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// 均匀噪声的幅度，噪声取值范围为 ±amplitude/2
    pub noise_amplitude: f64,
    /// 噪声随机数种子；为 `None` 时使用系统熵
    pub noise_seed: Option<u64>,
    pub circle_radius: f64,
    /// 绕圈角速度（单位：rad/s）
    pub circle_angular_velocity: f64,
    /// 下潜速度（单位：m/s）
    pub dive_speed: f64,
    /// 上浮速度（单位：m/s）
    pub surface_speed: f64,
    pub forward_speed: f64,
    /// 下潜的最大深度（单位：m）
    pub max_depth: f64,
    /// 每次仿真开始时的深度（单位：m）
    pub start_depth: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            noise_amplitude: 0.01,
            noise_seed: None,
            circle_radius: 5.0,
            circle_angular_velocity: 0.1,
            dive_speed: 0.5,
            surface_speed: 0.3,
            forward_speed: 1.0,
            max_depth: 50.0,
            start_depth: 2.0,
        }
    }
}

/// 服务调用配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServicesConfig {
    /// 操作员 `call` 命令默认调用的触发式服务
    pub trigger_service: String,
    /// 单次服务调用的超时时间（单位：毫秒）
    pub call_timeout_ms: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            trigger_service: "/example_service".to_string(),
            call_timeout_ms: 5000,
        }
    }
}

/// 界面与操作员控制台配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    /// 界面偏好 (上次选择的场景、面板展开状态) 的存储文件
    pub preferences_path: PathBuf,
    /// 预检报告输出到日志的周期（单位：毫秒）
    pub status_interval_ms: u64,
    /// 操作员 `publish` 命令发布文本消息的话题
    pub command_topic: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            preferences_path: PathBuf::from("ui_prefs.json"),
            status_interval_ms: 1000,
            command_topic: "/operator_command".to_string(),
        }
    }
}

/// 回环网关 (`loopback_bridge`) 配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub listen_addr: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9090".to_string(),
        }
    }
}

/// 应用的主配置结构体
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub rosbridge: RosbridgeConfig,
    pub monitor: MonitorConfig,
    pub simulation: SimulationConfig,
    pub services: ServicesConfig,
    pub ui: UiConfig,
    pub bridge: BridgeConfig,
}

/// 获取配置文件路径：命令行给出的路径优先，否则使用当前目录下的默认文件名
pub fn resolve_config_path(cli_arg: Option<String>) -> PathBuf {
    match cli_arg {
        Some(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

/// 加载或创建应用配置文件
///
/// 文件不存在或内容损坏时使用默认配置，并尝试把默认配置写回该路径。
/// 缺失的字段按各段的默认值补齐。
pub fn load_or_create_config(config_file_path: &Path) -> AppConfig {
    match fs::read_to_string(config_file_path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("[配置模块] 已成功从配置文件 {:?} 加载应用配置。", config_file_path);
                config
            }
            Err(e) => {
                warn!(
                    "[配置模块] 警告：从 {:?} 反序列化配置失败: {}. 文件可能已损坏。将使用默认配置并尝试覆盖。",
                    config_file_path, e
                );
                let default_config = AppConfig::default();
                save_config(&default_config, config_file_path);
                default_config
            }
        },
        Err(e) => {
            info!(
                "[配置模块] 未在 {:?} 找到配置文件或读取时发生错误 (错误: {}). 将使用默认配置并尝试创建新文件。",
                config_file_path, e
            );
            let default_config = AppConfig::default();
            save_config(&default_config, config_file_path);
            default_config
        }
    }
}

/// 保存配置到文件，失败只记录警告
pub fn save_config(config: &AppConfig, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("[配置模块] 错误：创建配置目录 {:?} 失败: {}", parent, e);
                return;
            }
        }
    }

    match serde_json::to_string_pretty(config) {
        Ok(content) => {
            if let Err(e) = fs::write(path, content) {
                warn!("[配置模块] 错误：将配置写入文件 {:?} 时失败: {}", path, e);
            } else {
                info!("[配置模块] 已成功将当前配置保存到 {:?}.", path);
            }
        }
        Err(e) => {
            warn!("[配置模块] 错误：序列化配置信息以便保存时失败: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_creates_defaults() {
        let dir = tempfile::tempdir().expect("无法创建临时目录");
        let path = dir.path().join("nested").join(DEFAULT_CONFIG_FILE);

        let config = load_or_create_config(&path);
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.rosbridge.url, "ws://localhost:9090");
        assert_eq!(config.rosbridge.reconnect_interval_ms, 1000);
        assert!(path.exists(), "默认配置应被写回磁盘");
    }

    #[test]
    fn test_corrupt_file_falls_back_and_is_overwritten() {
        let dir = tempfile::tempdir().expect("无法创建临时目录");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "{ not json").expect("写入失败");

        let config = load_or_create_config(&path);
        assert_eq!(config, AppConfig::default());
        let rewritten = fs::read_to_string(&path).expect("读取失败");
        assert!(serde_json::from_str::<AppConfig>(&rewritten).is_ok());
    }

    #[test]
    /// 只写部分字段时，其余字段取默认值。
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("无法创建临时目录");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, r#"{"monitor": {"window_size": 20}, "simulation": {"noise_seed": 7}}"#).expect("写入失败");

        let config = load_or_create_config(&path);
        assert_eq!(config.monitor.window_size, 20);
        assert_eq!(config.monitor.liveness_timeout_ms, 3000);
        assert_eq!(config.simulation.noise_seed, Some(7));
        assert_eq!(config.simulation.circle_radius, 5.0);
        assert_eq!(config.services.trigger_service, "/example_service");
    }

    #[test]
    fn test_resolve_config_path() {
        assert_eq!(resolve_config_path(None), PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(resolve_config_path(Some("  ".to_string())), PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(resolve_config_path(Some("/tmp/x.json".to_string())), PathBuf::from("/tmp/x.json"));
    }
}

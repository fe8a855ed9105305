// preflight_dashboard/src/prefs.rs

//! 界面偏好的持久化：一个 JSON 键值文件。
//!
//! 启动时读取一次，每次修改后立即写回。文件缺失、内容损坏、场景名未知
//! 或写入失败都只记录日志并回退到默认值，从不向调用方返回错误。

use common_models::enums::Scenario;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SCENARIO_KEY: &str = "sim.scenario";
pub const EXPANDED_KEY: &str = "sim.expanded";

#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl PreferenceStore {
    /// 从 `path` 读取偏好；任何读取问题都得到一个空的存储。
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(values) => {
                    info!("[界面偏好] 已从 {:?} 读取 {} 项偏好。", path, values.len());
                    values
                }
                Err(e) => {
                    warn!("[界面偏好] 偏好文件 {:?} 已损坏 ({})，使用默认值。", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) => {
                debug!("[界面偏好] 未读取到偏好文件 {:?} ({})，使用默认值。", path, e);
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// 写入一项偏好并立即保存。值未变化时不写盘。
    pub fn set(&mut self, key: &str, value: &str) {
        if self.get(key) == Some(value) {
            return;
        }
        self.values.insert(key.to_string(), value.to_string());
        self.save();
    }

    fn save(&self) {
        let content = match serde_json::to_string_pretty(&self.values) {
            Ok(content) => content,
            Err(e) => {
                warn!("[界面偏好] 序列化偏好失败: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, content) {
            warn!("[界面偏好] 写入偏好文件 {:?} 失败: {}", self.path, e);
        }
    }

    /// 上次选择的场景；缺失或无法识别时为 `idle`。
    pub fn scenario(&self) -> Scenario {
        match self.get(SCENARIO_KEY) {
            Some(name) => name.parse().unwrap_or_else(|e| {
                warn!("[界面偏好] {}，使用默认场景。", e);
                Scenario::default()
            }),
            None => Scenario::default(),
        }
    }

    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.set(SCENARIO_KEY, scenario.as_str());
    }

    /// 仿真面板是否展开；只有 `"1"` 表示展开。
    pub fn expanded(&self) -> bool {
        self.get(EXPANDED_KEY) == Some("1")
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        self.set(EXPANDED_KEY, if expanded { "1" } else { "0" });
    }
}

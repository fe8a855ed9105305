//! 通用枚举模块。
//!
//! 本模块定义了在仪表盘各组件之间共享的枚举类型，目前主要是遥测仿真所使用的
//! 运动场景 (`Scenario`)。场景名称同时用于操作员控制台输入和偏好存储，
//! 因此其字符串形式 (`idle`、`dive` ...) 是稳定的外部约定。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 遥测仿真器支持的运动场景。
///
/// 每个场景都是一个确定性的运动剖面，仿真器在每个节拍根据它推进状态。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// 静止：速度清零。
    #[default]
    Idle,
    /// 以恒定速度下潜。
    Dive,
    /// 以恒定速度上浮，到达水面后停止。
    Surface,
    /// 以恒定速度向前航行。
    Forward,
    /// 绕原点做匀速圆周运动，偏航角等于角位置。
    Circle,
    /// 横滚/俯仰的正弦扰动 (模拟风浪)，无平移。
    Wobble,
}

impl Scenario {
    /// 全部场景，按操作界面中的展示顺序排列。
    pub const ALL: [Scenario; 6] = [
        Scenario::Idle,
        Scenario::Dive,
        Scenario::Surface,
        Scenario::Forward,
        Scenario::Circle,
        Scenario::Wobble,
    ];

    /// 场景的稳定名称。
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Idle => "idle",
            Scenario::Dive => "dive",
            Scenario::Surface => "surface",
            Scenario::Forward => "forward",
            Scenario::Circle => "circle",
            Scenario::Wobble => "wobble",
        }
    }

    /// 面向操作员的描述文字。
    pub fn label(&self) -> &'static str {
        match self {
            Scenario::Idle => "Idle (Stationary)",
            Scenario::Dive => "Dive Down",
            Scenario::Surface => "Surface Up",
            Scenario::Forward => "Move Forward",
            Scenario::Circle => "Circle Pattern",
            Scenario::Wobble => "Wobble (Rough Waters)",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 解析未知场景名称时返回的错误，携带原始输入。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownScenario(pub String);

impl fmt::Display for UnknownScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "未知的仿真场景: '{}'", self.0)
    }
}

impl std::error::Error for UnknownScenario {}

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Scenario::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.as_str() == normalized)
            .ok_or_else(|| UnknownScenario(s.to_string()))
    }
}

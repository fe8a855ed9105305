// preflight_dashboard/src/error.rs

use common_models::enums::UnknownScenario;
use rust_websocket_utils::error::WsError;
use thiserror::Error;

/// 仪表盘的主要错误类型
///
/// 会话管理器与话题监视器从不返回错误，它们只暴露状态；
/// 只有发布、服务调用和操作员命令会以此类型拒绝请求。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    /// 当前没有可用连接，请求被同步拒绝且不会排队。
    #[error("未连接到 rosbridge，请求已被拒绝")]
    NotConnected,

    #[error("传输层错误: {0}")]
    Transport(String),

    #[error("消息序列化/反序列化失败: {0}")]
    Serialization(String),

    /// 服务端返回 `result = false`，附带可读的错误描述。
    #[error("服务调用失败: {0}")]
    ServiceCall(String),

    #[error("服务 {service} 在 {timeout_ms} ms 内未响应")]
    ServiceTimeout { service: String, timeout_ms: u64 },

    /// 仿真运行中不允许切换场景。
    #[error("仿真正在运行，请先停止再切换场景")]
    SimulationRunning,

    #[error(transparent)]
    UnknownScenario(#[from] UnknownScenario),

    #[error("仪表盘已停止运行")]
    DashboardStopped,
}

impl From<WsError> for DashboardError {
    fn from(err: WsError) -> Self {
        match err {
            WsError::NotConnected | WsError::SendErrorClosed => DashboardError::NotConnected,
            WsError::SerializationError(details) | WsError::DeserializationError(details) => {
                DashboardError::Serialization(details)
            }
            other => DashboardError::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Serialization(err.to_string())
    }
}

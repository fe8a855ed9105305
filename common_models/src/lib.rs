//! `common_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了预检仪表盘 (`preflight_dashboard`) 与 rosbridge 网关之间
//! 交换的 ROS 消息结构，以及多个组件共享的枚举类型。
//!
//! 主要包含以下类型的模型：
//! - **`std_msgs`**: 时间戳、消息头 (`Header`) 与字符串消息。
//! - **`geometry_msgs`**: 向量、四元数、位姿、速度 (Twist) 及其带协方差的版本。
//! - **`sensor_msgs`**: 惯性测量单元消息 (`Imu`)。
//! - **`nav_msgs`**: 里程计消息 (`Odometry`)，DVL 速度通过它发布。
//! - **`std_srvs`**: 触发式服务 (`Trigger`) 的请求/响应。
//! - **`enums`**: 仿真场景 (`Scenario`) 等共享枚举。
//!
//! 所有模型都派生 `Serialize`/`Deserialize`/`Debug`/`Clone`，字段名与 ROS 2 的
//! JSON 表示保持一致 (snake_case)，以便直接经由 rosbridge 传输。

pub mod enums;
pub mod geometry_msgs;
pub mod nav_msgs;
pub mod sensor_msgs;
pub mod std_msgs;
pub mod std_srvs;

/// 可以在某个话题上收发的 ROS 消息类型。
///
/// `TYPE_NAME` 是 rosbridge `subscribe` / `advertise` 操作中 `type` 字段使用的完整类型名，
/// 例如 `"sensor_msgs/Imu"`。
pub trait RosMessage: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + 'static {
    /// ROS 类型全名。
    const TYPE_NAME: &'static str;
}

/// 可以通过 rosbridge `call_service` 调用的 ROS 服务类型。
pub trait RosService {
    /// ROS 服务类型全名，例如 `"std_srvs/Trigger"`。
    const TYPE_NAME: &'static str;
    /// 请求结构。
    type Request: serde::Serialize + Send + 'static;
    /// 响应结构。
    type Response: serde::de::DeserializeOwned + Send + 'static;
}

//! `preflight_dashboard`：经由 rosbridge WebSocket 网关连接 ROS 的预检仪表盘。
//!
//! 模块划分：
//! - `session`：连接会话状态机与重连定时器，发布 `connected` 信号；
//! - `monitor`：每个订阅话题的存活与频率监视；
//! - `channel`：类型化的话题订阅/发布句柄；
//! - `service`：rosbridge 服务调用与响应匹配；
//! - `simulation`：10 Hz 遥测仿真器；
//! - `dashboard`：单任务运行时，把以上组件与操作员命令串联起来；
//! - `console`：标准输入上的操作员控制台；
//! - `transport`、`config`、`prefs`、`views`、`error`：边界适配与公共设施。

pub mod channel;
pub mod config;
pub mod console;
pub mod dashboard;
pub mod error;
pub mod monitor;
pub mod prefs;
pub mod service;
pub mod session;
pub mod simulation;
pub mod transport;
pub mod views;

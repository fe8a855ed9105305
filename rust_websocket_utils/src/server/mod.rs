// rust_websocket_utils/src/server/mod.rs

//! WebSocket 服务端模块。
//!
//! - `transport`: 监听端口、完成 WebSocket 握手，并把每个连接交给回调处理。
//! - `bridge`: 基于 `transport` 的最小 rosbridge 回环网关。它按话题把 `publish`
//!   转发给所有订阅者 (包括发布者自己)，并应答已注册的触发式服务。
//!   仪表盘在没有机器人时可以连接它，让仿真数据经网关回环到预检视图。

pub mod bridge;
pub mod transport;

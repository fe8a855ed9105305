//! `rust_websocket_utils` 提供与 rosbridge 网关进行 WebSocket 通信的实用功能。
//!
//! 主要模块包括：
//! - `message`: rosbridge v2 协议的操作消息 `RosbridgeMessage` 及其文本帧编解码。
//! - `error`: 本库统一的错误类型 `WsError`。
//! - `client`: WebSocket 客户端传输层 (连接、发送、接收)。
//! - `server`: WebSocket 服务端传输层，以及一个最小的 rosbridge 回环网关，
//!   用于在没有机器人的情况下联调仪表盘和运行集成测试。

pub mod client;
pub mod error;
pub mod message;
pub mod server;

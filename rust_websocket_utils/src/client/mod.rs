// rust_websocket_utils/src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! 负责连接到 rosbridge 网关，并在建立的连接上收发 `RosbridgeMessage`。
//! 重连、订阅恢复等会话级逻辑不在这里，由上层应用的会话管理器负责。

pub mod transport;

// rust_websocket_utils/src/error.rs

//! 定义 WebSocket 工具库相关的错误类型。

use thiserror::Error;

/// WebSocket 工具库的统一错误类型。
#[derive(Error, Debug)]
pub enum WsError {
    /// 当 rosbridge 消息序列化为 JSON 失败时返回。
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 当收到的文本帧无法解析为 rosbridge 消息时返回。
    /// 这类错误只影响单条消息，不会终止连接。
    #[error("反序列化错误: {0}")]
    DeserializationError(String),

    /// WebSocket 协议相关的错误，例如握手失败或连接被重置。
    #[error("WebSocket协议错误: {0}")]
    WebSocketProtocolError(#[from] tokio_tungstenite::tungstenite::Error),

    /// 底层 I/O 错误 (例如监听端口绑定失败)。
    #[error("I/O错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 当尝试发送消息到一个已关闭的通道时发生。
    #[error("发送错误: 通道已关闭")]
    SendErrorClosed,

    /// 无效的 URL 格式。
    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    /// 未连接错误，当尝试在未建立连接时进行操作。
    #[error("未连接")]
    NotConnected,

    /// 通用消息错误，用于其他未明确分类的错误 (例如收到了二进制帧)。
    #[error("消息错误: {0}")]
    Message(String),
}

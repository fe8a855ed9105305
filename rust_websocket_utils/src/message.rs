// rust_websocket_utils/src/message.rs

//! rosbridge v2 协议的操作消息。
//!
//! rosbridge 的每一帧都是一个 JSON 文本，由 `op` 字段区分操作类型，
//! 例如 `{"op": "subscribe", "topic": "/imu/data", "type": "sensor_msgs/Imu"}`。
//! 本模块把这些操作建模为一个按 `op` 标记的枚举 `RosbridgeMessage`，
//! 并提供在 WebSocket 流上收发它们的辅助函数，客户端与服务端共用。
//!
//! 解析失败只影响单条消息 (`WsError::DeserializationError`)，调用方应记录后继续接收。

use crate::error::WsError;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{Error as TungsteniteError, protocol::Message},
};

/// rosbridge 协议中的一条操作消息。
///
/// 所有操作都带一个可选的 `id`，用于把响应 (例如 `service_response`) 与请求对应起来，
/// 或者区分同一话题上的多个订阅。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RosbridgeMessage {
    /// 声明将要在某话题上发布指定类型的消息。
    Advertise {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        topic: String,
        #[serde(rename = "type")]
        msg_type: String,
    },
    /// 撤销发布声明。
    Unadvertise {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        topic: String,
    },
    /// 在话题上发布一条消息；网关也用它把消息推送给订阅者。
    Publish {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        topic: String,
        msg: Value,
    },
    /// 订阅话题。
    Subscribe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        topic: String,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        msg_type: Option<String>,
    },
    /// 取消订阅。带 `id` 时只取消该订阅，否则取消该连接在此话题上的全部订阅。
    Unsubscribe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        topic: String,
    },
    /// 调用服务。
    CallService {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        service: String,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        service_type: Option<String>,
        #[serde(default)]
        args: Value,
    },
    /// 服务调用的结果。`result == false` 时 `values` 通常是一条错误描述字符串。
    ServiceResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        service: String,
        #[serde(default)]
        values: Option<Value>,
        result: bool,
    },
    /// 网关发来的状态/诊断信息。
    Status {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        level: String,
        msg: String,
    },
}

impl RosbridgeMessage {
    /// 操作名称，用于日志。
    pub fn op(&self) -> &'static str {
        match self {
            RosbridgeMessage::Advertise { .. } => "advertise",
            RosbridgeMessage::Unadvertise { .. } => "unadvertise",
            RosbridgeMessage::Publish { .. } => "publish",
            RosbridgeMessage::Subscribe { .. } => "subscribe",
            RosbridgeMessage::Unsubscribe { .. } => "unsubscribe",
            RosbridgeMessage::CallService { .. } => "call_service",
            RosbridgeMessage::ServiceResponse { .. } => "service_response",
            RosbridgeMessage::Status { .. } => "status",
        }
    }

    /// 序列化为一帧 JSON 文本。
    pub fn to_text(&self) -> Result<String, WsError> {
        serde_json::to_string(self)
            .map_err(|e| WsError::SerializationError(format!("rosbridge 消息 ({}) 序列化失败: {}", self.op(), e)))
    }

    /// 从一帧 JSON 文本解析。
    pub fn from_text(text: &str) -> Result<Self, WsError> {
        serde_json::from_str(text).map_err(|e| {
            WsError::DeserializationError(format!("无法解析 rosbridge 消息: {}, 原始文本: '{}'", e, text))
        })
    }
}

/// 通过 WebSocket 发送端发送一条 rosbridge 消息。
pub async fn send_message<S>(
    ws_sender: &mut SplitSink<WebSocketStream<S>, Message>,
    message: &RosbridgeMessage,
) -> Result<(), WsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let text = message.to_text()?;
    debug!("发送 rosbridge 消息: {}", text);
    ws_sender.send(Message::Text(text)).await?;
    Ok(())
}

/// 从 WebSocket 接收端读取下一条 rosbridge 消息。
///
/// Ping/Pong 等控制帧由 `tokio-tungstenite` 自动处理，这里直接跳过。
///
/// # Returns
/// * `Some(Ok(msg))`：成功收到并解析了一条消息。
/// * `Some(Err(e))`：收到了无法解析的帧 (`DeserializationError`，连接仍可用)，
///   或底层发生了协议/I/O 错误 (连接应视为已失效)。
/// * `None`：连接已关闭。
pub async fn receive_message<S>(
    ws_receiver: &mut SplitStream<WebSocketStream<S>>,
) -> Option<Result<RosbridgeMessage, WsError>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => break Some(RosbridgeMessage::from_text(&text)),
            Some(Ok(Message::Binary(bin))) => {
                // rosbridge 的 CBOR/PNG 压缩模式未启用，二进制帧按错误处理
                break Some(Err(WsError::Message(format!(
                    "收到了非预期的二进制帧 ({} 字节)",
                    bin.len()
                ))));
            }
            Some(Ok(Message::Close(frame))) => {
                debug!("收到 Close 控制帧: {:?}", frame);
                break None;
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
            Some(Err(TungsteniteError::ConnectionClosed)) | Some(Err(TungsteniteError::AlreadyClosed)) => {
                break None;
            }
            Some(Err(e)) => break Some(Err(WsError::WebSocketProtocolError(e))),
            None => break None,
        }
    }
}

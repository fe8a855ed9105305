// rust_websocket_utils/src/client/transport.rs

//! 客户端 WebSocket 传输层核心逻辑。
//!
//! 提供建立到 rosbridge 网关的连接 (`connect_client`)，以及在连接上发送和接收
//! `RosbridgeMessage` 的能力。连接成功后流被拆分为发送端与接收端，
//! 以便上层可以在一个任务中用 `tokio::select!` 同时处理收发。

use crate::error::WsError;
use crate::message::{self, RosbridgeMessage};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use log::{debug, error, info};
use tokio_tungstenite::{WebSocketStream, connect_async, tungstenite::protocol::Message};
use url::Url;

/// `ClientWsStream` 代表一个可能经过 TLS 加密的 TCP WebSocket 流 (`ws://` 或 `wss://`)。
pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// 一个活动的客户端 WebSocket 连接。
pub struct ClientConnection {
    /// 发送端。
    pub ws_sender: SplitSink<ClientWsStream, Message>,
    /// 接收端。字段公开以便在 `select!` 中与发送端分别借用。
    pub ws_receiver: SplitStream<ClientWsStream>,
}

impl ClientConnection {
    /// 异步发送一条 rosbridge 消息。
    pub async fn send_message(&mut self, message: &RosbridgeMessage) -> Result<(), WsError> {
        message::send_message(&mut self.ws_sender, message).await
    }

    /// 接收下一条 rosbridge 消息，语义见 [`message::receive_message`]。
    pub async fn receive_message(&mut self) -> Option<Result<RosbridgeMessage, WsError>> {
        message::receive_message(&mut self.ws_receiver).await
    }

    /// 发送 Close 帧并关闭发送端。
    pub async fn close(&mut self) -> Result<(), WsError> {
        self.ws_sender.close().await?;
        Ok(())
    }
}

/// 异步连接到指定的 rosbridge WebSocket 端点。
///
/// # Arguments
/// * `url_str` - 端点 URL，例如 `"ws://localhost:9090"`。
///
/// # Returns
/// * `Ok(ClientConnection)`：握手成功。
/// * `Err(WsError::InvalidUrl)`：URL 无法解析或不是 `ws`/`wss` 方案。
/// * `Err(WsError::WebSocketProtocolError)`：TCP 连接或握手失败。
pub async fn connect_client(url_str: &str) -> Result<ClientConnection, WsError> {
    info!("客户端：开始尝试连接到 rosbridge 端点，URL: {}", url_str);
    let parsed_url = Url::parse(url_str)
        .map_err(|e| WsError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", url_str, e)))?;
    if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
        return Err(WsError::InvalidUrl(format!(
            "不支持的 URL 方案 '{}' (仅支持 ws/wss): {}",
            parsed_url.scheme(),
            url_str
        )));
    }

    match connect_async(parsed_url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!("客户端：已成功连接到 {} (HTTP 状态码: {})", url_str, response.status());
            debug!("客户端：WebSocket 连接响应头: {:?}", response.headers());
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { ws_sender, ws_receiver })
        }
        Err(e) => {
            error!("客户端：连接到 {} 失败，错误: {}", url_str, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

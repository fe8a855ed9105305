// rust_websocket_utils/src/server/transport.rs

//! 服务端 WebSocket 监听、接受连接和握手逻辑。

use crate::error::WsError;
use log::{error, info};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_tungstenite::{WebSocketStream, accept_async};

/// 经过 WebSocket 握手后的服务端 TCP 流。
pub type WsStream = WebSocketStream<TcpStream>;

/// 负责 WebSocket 服务端的监听和连接接受。
pub struct ServerTransport;

impl ServerTransport {
    /// 在已绑定的监听器上无限期地接受连接。
    ///
    /// 每个连接在独立的 Tokio 任务中完成握手，然后调用 `on_connect`。
    /// 连接任务归本函数所有：本函数的 future 被丢弃 (例如所在任务被取消) 时，
    /// 所有连接随之关闭。单个连接的握手失败或 `accept` 失败只记录日志，不会终止监听。
    /// 测试中可以先绑定 `127.0.0.1:0` 再调用本函数，以获得确定的端口。
    pub async fn serve<F, Fut>(listener: TcpListener, on_connect: F) -> Result<(), WsError>
    where
        F: Fn(WsStream, SocketAddr) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        info!("WebSocket 服务器正在监听地址: {}", local_addr);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((tcp_stream, peer_addr)) => {
                        info!("从 {} 接受了新的 TCP 连接", peer_addr);
                        let on_connect_callback = on_connect.clone();
                        connections.spawn(async move {
                            match accept_async(tcp_stream).await {
                                Ok(ws_stream) => {
                                    info!("与 {} 的 WebSocket 握手成功", peer_addr);
                                    on_connect_callback(ws_stream, peer_addr).await;
                                }
                                Err(e) => {
                                    error!("与 {} 的 WebSocket 握手失败: {}", peer_addr, e);
                                }
                            }
                        });
                    }
                    Err(e) => {
                        error!("接受 TCP 连接失败: {}。服务器将继续运行。", e);
                    }
                },
                // 回收已结束的连接任务
                Some(_) = connections.join_next() => {}
            }
        }
    }
}

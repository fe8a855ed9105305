// rust_websocket_utils/src/server/bridge.rs

//! 最小的 rosbridge 回环网关。
//!
//! 只实现仪表盘用到的协议子集：
//! - `subscribe` / `unsubscribe`：按连接记录订阅 (话题 → 订阅 ID 集合)；
//! - `advertise` / `unadvertise`：仅记录日志，发布不要求事先声明；
//! - `publish`：转发给所有订阅了该话题的连接，包括发布者自身；
//! - `call_service`：对已注册的触发式服务返回预设的 `{success, message}`，
//!   对未知服务返回 `result = false` 和一条错误描述。
//!
//! 连接表使用 `DashMap`，出站消息经每个连接自己的通道写出，
//! 因此 `handle_message` 本身是同步的，可以直接在单元测试中驱动。

use crate::error::WsError;
use crate::message::{self, RosbridgeMessage};
use crate::server::transport::{ServerTransport, WsStream};
use common_models::std_srvs::TriggerResponse;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use uuid::Uuid;

/// 未带 `id` 的订阅在订阅集合中的占位键。
const ANONYMOUS_SUBSCRIPTION: &str = "";

/// 网关视角下的一个客户端连接。
#[derive(Debug)]
struct BridgeClient {
    peer_addr: Option<SocketAddr>,
    sender: mpsc::UnboundedSender<RosbridgeMessage>,
    /// 话题 → 该连接在此话题上的订阅 ID 集合。
    subscriptions: HashMap<String, HashSet<String>>,
}

/// rosbridge 回环网关。
#[derive(Debug, Default)]
pub struct LoopbackBridge {
    clients: DashMap<Uuid, BridgeClient>,
    trigger_services: DashMap<String, TriggerResponse>,
}

impl LoopbackBridge {
    /// 创建一个没有任何连接和服务的网关。
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 注册一个触发式服务及其固定响应。同名服务会被覆盖。
    pub fn register_trigger(&self, service: &str, response: TriggerResponse) {
        info!("[回环网关] 注册触发式服务 '{}' (success={})", service, response.success);
        self.trigger_services.insert(service.to_string(), response);
    }

    /// 当前连接数。
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// 在已绑定的监听器上运行网关，直到任务被取消。
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), WsError> {
        ServerTransport::serve(listener, move |ws_stream, peer_addr| {
            let bridge = self.clone();
            async move { bridge.handle_connection(ws_stream, peer_addr).await }
        })
        .await
    }

    /// 登记一个新连接，返回其 ID 和该连接的出站消息接收端。
    ///
    /// 真实连接由 [`LoopbackBridge::handle_connection`] 调用它；
    /// 单元测试可以直接调用以模拟连接。
    pub fn register_client(
        &self,
        peer_addr: Option<SocketAddr>,
    ) -> (Uuid, mpsc::UnboundedReceiver<RosbridgeMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let client_id = Uuid::new_v4();
        self.clients.insert(
            client_id,
            BridgeClient {
                peer_addr,
                sender,
                subscriptions: HashMap::new(),
            },
        );
        info!("[回环网关] 客户端 {} ({:?}) 已登记，当前连接数: {}", client_id, peer_addr, self.clients.len());
        (client_id, receiver)
    }

    /// 移除一个连接及其全部订阅。
    pub fn remove_client(&self, client_id: &Uuid) {
        if let Some((_, client)) = self.clients.remove(client_id) {
            info!(
                "[回环网关] 客户端 {} ({:?}) 已移除，释放 {} 个话题订阅",
                client_id,
                client.peer_addr,
                client.subscriptions.len()
            );
        }
    }

    /// 处理来自某个连接的一条消息。
    pub fn handle_message(&self, client_id: Uuid, msg: RosbridgeMessage) {
        match msg {
            RosbridgeMessage::Subscribe { id, topic, msg_type } => {
                if let Some(mut client) = self.clients.get_mut(&client_id) {
                    debug!("[回环网关] {} 订阅 '{}' (类型 {:?}, id {:?})", client_id, topic, msg_type, id);
                    client
                        .subscriptions
                        .entry(topic)
                        .or_default()
                        .insert(id.unwrap_or_else(|| ANONYMOUS_SUBSCRIPTION.to_string()));
                }
            }
            RosbridgeMessage::Unsubscribe { id, topic } => {
                if let Some(mut client) = self.clients.get_mut(&client_id) {
                    debug!("[回环网关] {} 取消订阅 '{}' (id {:?})", client_id, topic, id);
                    let now_empty = match (id, client.subscriptions.get_mut(&topic)) {
                        (Some(id), Some(ids)) => {
                            ids.remove(&id);
                            ids.is_empty()
                        }
                        (None, Some(_)) => true,
                        (_, None) => false,
                    };
                    if now_empty {
                        client.subscriptions.remove(&topic);
                    }
                }
            }
            RosbridgeMessage::Advertise { topic, msg_type, .. } => {
                debug!("[回环网关] {} 声明发布 '{}' ({})", client_id, topic, msg_type);
            }
            RosbridgeMessage::Unadvertise { topic, .. } => {
                debug!("[回环网关] {} 撤销发布 '{}'", client_id, topic);
            }
            RosbridgeMessage::Publish { topic, msg, .. } => self.fan_out(&topic, msg),
            RosbridgeMessage::CallService { id, service, .. } => {
                let response = match self.trigger_services.get(&service) {
                    Some(trigger) => match serde_json::to_value(trigger.value()) {
                        Ok(values) => RosbridgeMessage::ServiceResponse {
                            id,
                            service,
                            values: Some(values),
                            result: true,
                        },
                        Err(e) => RosbridgeMessage::ServiceResponse {
                            id,
                            values: Some(serde_json::Value::String(format!("服务响应序列化失败: {}", e))),
                            service,
                            result: false,
                        },
                    },
                    None => {
                        warn!("[回环网关] {} 调用了未注册的服务 '{}'", client_id, service);
                        RosbridgeMessage::ServiceResponse {
                            id,
                            values: Some(serde_json::Value::String(format!("Service {} does not exist", service))),
                            service,
                            result: false,
                        }
                    }
                };
                self.send_to(&client_id, response);
            }
            other => {
                debug!("[回环网关] 忽略来自 {} 的 '{}' 操作", client_id, other.op());
            }
        }
    }

    fn fan_out(&self, topic: &str, msg: serde_json::Value) {
        let mut delivered = 0usize;
        for client in self.clients.iter() {
            if client.subscriptions.contains_key(topic) {
                let forwarded = RosbridgeMessage::Publish {
                    id: None,
                    topic: topic.to_string(),
                    msg: msg.clone(),
                };
                if client.sender.send(forwarded).is_ok() {
                    delivered += 1;
                }
            }
        }
        debug!("[回环网关] 话题 '{}' 的消息已转发给 {} 个订阅者", topic, delivered);
    }

    fn send_to(&self, client_id: &Uuid, msg: RosbridgeMessage) {
        if let Some(client) = self.clients.get(client_id) {
            if client.sender.send(msg).is_err() {
                warn!("[回环网关] 客户端 {} 的写通道已关闭，消息被丢弃", client_id);
            }
        }
    }

    /// 服务一个已完成握手的连接，直到对方断开。
    pub async fn handle_connection(self: Arc<Self>, ws_stream: WsStream, peer_addr: SocketAddr) {
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (client_id, mut outgoing) = self.register_client(Some(peer_addr));
        // 任务被取消时同样会移除连接
        let _registration = ClientRegistration { bridge: &self, client_id };

        loop {
            tokio::select! {
                outbound = outgoing.recv() => {
                    let Some(msg) = outbound else { break };
                    if let Err(e) = message::send_message(&mut ws_sender, &msg).await {
                        warn!("[回环网关] 向 {} 写入消息失败: {}", peer_addr, e);
                        break;
                    }
                }
                inbound = message::receive_message(&mut ws_receiver) => match inbound {
                    Some(Ok(msg)) => self.handle_message(client_id, msg),
                    Some(Err(WsError::DeserializationError(details))) => {
                        warn!("[回环网关] 来自 {} 的消息无法解析: {}", peer_addr, details);
                        self.send_to(
                            &client_id,
                            RosbridgeMessage::Status {
                                id: None,
                                level: "error".to_string(),
                                msg: details,
                            },
                        );
                    }
                    Some(Err(e)) => {
                        error!("[回环网关] 与 {} 的连接出错: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("[回环网关] {} 已断开连接", peer_addr);
                        break;
                    }
                },
            }
        }

        let _ = ws_sender.close().await;
    }
}

/// 在作用域结束时把连接从网关中移除。
struct ClientRegistration<'a> {
    bridge: &'a LoopbackBridge,
    client_id: Uuid,
}

impl Drop for ClientRegistration<'_> {
    fn drop(&mut self) {
        self.bridge.remove_client(&self.client_id);
    }
}

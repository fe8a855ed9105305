// preflight_dashboard/src/transport.rs

//! 传输层边界。
//!
//! `Transport` 是仪表盘与 rosbridge 网关之间的全部能力集合：建立/关闭连接，
//! 以及按话题订阅、发布和调用服务。所有方法都是非阻塞的，
//! 请求被投递到每个连接独占的写任务中；没有连接时立即返回 `DashboardError::NotConnected`。
//!
//! 连接状态的变化与收到的消息以 `TransportEvent` 的形式经由无界 mpsc 通道送达，
//! 由仪表盘运行时的单一任务按到达顺序处理。每一次连接尝试恰好以一个
//! `Error` 或 `Close` 事件结束。

use crate::error::DashboardError;
use log::{debug, error, info, warn};
use rust_websocket_utils::client::transport::connect_client;
use rust_websocket_utils::error::WsError;
use rust_websocket_utils::message::{self, RosbridgeMessage};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// 传输层上报的事件。
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// 连接已建立。
    Connection,
    /// 连接尝试失败或连接因错误中断。
    Error(String),
    /// 连接被关闭 (对端关闭或本地调用了 `close`)。
    Close,
    /// 某个已订阅话题上收到的一条消息。
    Message { topic: String, msg: Value },
    /// 服务调用的响应。
    ServiceResponse {
        id: Option<String>,
        service: String,
        result: bool,
        values: Option<Value>,
    },
}

/// 到 ROS 中间件的传输能力。
pub trait Transport: Send + Sync {
    /// 开始连接到 `endpoint`；结果以事件形式异步上报。会中止之前未完成的尝试。
    fn connect(&self, endpoint: &str);
    /// 关闭当前连接 (若有)。
    fn close(&self);
    fn subscribe(&self, id: &str, topic: &str, msg_type: &str) -> Result<(), DashboardError>;
    fn unsubscribe(&self, id: &str, topic: &str) -> Result<(), DashboardError>;
    fn advertise(&self, topic: &str, msg_type: &str) -> Result<(), DashboardError>;
    fn unadvertise(&self, topic: &str) -> Result<(), DashboardError>;
    fn publish(&self, topic: &str, msg: Value) -> Result<(), DashboardError>;
    fn call_service(&self, id: &str, service: &str, service_type: &str, args: Value) -> Result<(), DashboardError>;
}

/// 恢复被污染的互斥锁；锁内只有句柄与发送端，状态始终一致。
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 当前连接的写端。`generation` 用于丢弃已被新尝试取代的旧任务写入的发送端。
#[derive(Debug, Default)]
struct OutgoingSlot {
    generation: u64,
    sender: Option<UnboundedSender<RosbridgeMessage>>,
}

/// 基于 rosbridge WebSocket 协议的 `Transport` 实现。
#[derive(Debug)]
pub struct RosbridgeTransport {
    outgoing: Arc<Mutex<OutgoingSlot>>,
    connection_task_handle: Mutex<Option<JoinHandle<()>>>,
    events: UnboundedSender<TransportEvent>,
}

impl RosbridgeTransport {
    /// 创建传输层实例，同时返回事件接收端。
    pub fn new() -> (Self, UnboundedReceiver<TransportEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let transport = Self {
            outgoing: Arc::new(Mutex::new(OutgoingSlot::default())),
            connection_task_handle: Mutex::new(None),
            events,
        };
        (transport, events_rx)
    }

    fn send(&self, message: RosbridgeMessage) -> Result<(), DashboardError> {
        let slot = lock(&self.outgoing);
        match slot.sender.as_ref() {
            Some(sender) => sender.send(message).map_err(|_| DashboardError::NotConnected),
            None => Err(DashboardError::NotConnected),
        }
    }
}

impl Transport for RosbridgeTransport {
    fn connect(&self, endpoint: &str) {
        let mut task_guard = lock(&self.connection_task_handle);
        if let Some(handle) = task_guard.take() {
            info!("[传输层] 检测到之前的连接任务仍在运行，正在取消...");
            handle.abort();
        }

        let generation = {
            let mut slot = lock(&self.outgoing);
            slot.generation += 1;
            slot.sender = None;
            slot.generation
        };

        let task = tokio::spawn(run_connection(
            endpoint.to_string(),
            generation,
            self.outgoing.clone(),
            self.events.clone(),
        ));
        *task_guard = Some(task);
    }

    fn close(&self) {
        let sender = lock(&self.outgoing).sender.take();
        match sender {
            // 丢弃写端后连接任务会发送 Close 帧并上报 Close 事件
            Some(_) => info!("[传输层] 正在关闭 rosbridge 连接..."),
            None => {
                if let Some(handle) = lock(&self.connection_task_handle).take() {
                    debug!("[传输层] 连接尚未建立，直接取消连接任务。");
                    handle.abort();
                }
            }
        }
    }

    fn subscribe(&self, id: &str, topic: &str, msg_type: &str) -> Result<(), DashboardError> {
        self.send(RosbridgeMessage::Subscribe {
            id: Some(id.to_string()),
            topic: topic.to_string(),
            msg_type: Some(msg_type.to_string()),
        })
    }

    fn unsubscribe(&self, id: &str, topic: &str) -> Result<(), DashboardError> {
        self.send(RosbridgeMessage::Unsubscribe { id: Some(id.to_string()), topic: topic.to_string() })
    }

    fn advertise(&self, topic: &str, msg_type: &str) -> Result<(), DashboardError> {
        self.send(RosbridgeMessage::Advertise { id: None, topic: topic.to_string(), msg_type: msg_type.to_string() })
    }

    fn unadvertise(&self, topic: &str) -> Result<(), DashboardError> {
        self.send(RosbridgeMessage::Unadvertise { id: None, topic: topic.to_string() })
    }

    fn publish(&self, topic: &str, msg: Value) -> Result<(), DashboardError> {
        self.send(RosbridgeMessage::Publish { id: None, topic: topic.to_string(), msg })
    }

    fn call_service(&self, id: &str, service: &str, service_type: &str, args: Value) -> Result<(), DashboardError> {
        self.send(RosbridgeMessage::CallService {
            id: Some(id.to_string()),
            service: service.to_string(),
            service_type: Some(service_type.to_string()),
            args,
        })
    }
}

impl Drop for RosbridgeTransport {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.connection_task_handle).take() {
            handle.abort();
        }
    }
}

/// 单次连接的生命周期：建立连接、安装写端、收发循环，最后上报一个终止事件。
async fn run_connection(
    endpoint: String,
    generation: u64,
    outgoing: Arc<Mutex<OutgoingSlot>>,
    events: UnboundedSender<TransportEvent>,
) {
    let mut connection = match connect_client(&endpoint).await {
        Ok(connection) => connection,
        Err(e) => {
            let _ = events.send(TransportEvent::Error(e.to_string()));
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<RosbridgeMessage>();
    let installed = {
        let mut slot = lock(&outgoing);
        if slot.generation == generation {
            slot.sender = Some(tx);
            true
        } else {
            false
        }
    };
    if !installed {
        debug!("[传输层] (连接任务) 本次连接已被新的连接尝试取代，放弃。");
        let _ = connection.close().await;
        return;
    }
    info!("[传输层] (连接任务) 已连接到 rosbridge: {}", endpoint);
    let _ = events.send(TransportEvent::Connection);

    let terminal = loop {
        tokio::select! {
            outgoing_msg = rx.recv() => match outgoing_msg {
                Some(msg) => {
                    if let Err(e) = message::send_message(&mut connection.ws_sender, &msg).await {
                        error!("[传输层] (连接任务) 发送 {} 失败: {}", msg.op(), e);
                        break TransportEvent::Error(e.to_string());
                    }
                }
                None => {
                    debug!("[传输层] (连接任务) 写端已被释放，发送 Close 帧。");
                    let _ = connection.close().await;
                    break TransportEvent::Close;
                }
            },
            incoming = message::receive_message(&mut connection.ws_receiver) => match incoming {
                Some(Ok(msg)) => dispatch_incoming(msg, &events),
                Some(Err(WsError::DeserializationError(details))) => {
                    warn!("[传输层] (连接任务) 忽略一条无法解析的消息: {}", details);
                }
                Some(Err(e)) => {
                    warn!("[传输层] (连接任务) 连接因错误中断: {}", e);
                    break TransportEvent::Error(e.to_string());
                }
                None => {
                    info!("[传输层] (连接任务) rosbridge 关闭了连接。");
                    break TransportEvent::Close;
                }
            },
        }
    };

    {
        let mut slot = lock(&outgoing);
        if slot.generation == generation {
            slot.sender = None;
        }
    }
    let _ = events.send(terminal);
}

fn dispatch_incoming(msg: RosbridgeMessage, events: &UnboundedSender<TransportEvent>) {
    match msg {
        RosbridgeMessage::Publish { topic, msg, .. } => {
            let _ = events.send(TransportEvent::Message { topic, msg });
        }
        RosbridgeMessage::ServiceResponse { id, service, values, result } => {
            let _ = events.send(TransportEvent::ServiceResponse { id, service, result, values });
        }
        RosbridgeMessage::Status { level, msg, .. } => match level.as_str() {
            "error" | "warning" => warn!("[传输层] rosbridge 状态 ({}): {}", level, msg),
            _ => info!("[传输层] rosbridge 状态 ({}): {}", level, msg),
        },
        other => debug!("[传输层] 忽略来自网关的 {} 操作。", other.op()),
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// `MockTransport` 记录的一次调用。
    #[derive(Debug, Clone, PartialEq)]
    pub enum TransportCall {
        Connect(String),
        Close,
        Subscribe { id: String, topic: String, msg_type: String },
        Unsubscribe { id: String, topic: String },
        Advertise { topic: String, msg_type: String },
        Unadvertise { topic: String },
        Publish { topic: String, msg: Value },
        CallService { id: String, service: String, service_type: String, args: Value },
    }

    /// 记录所有调用的传输层替身；`connected` 为假时除 connect/close 外的调用都返回 `NotConnected`。
    #[derive(Debug, Default)]
    pub struct MockTransport {
        calls: Mutex<Vec<TransportCall>>,
        connected: AtomicBool,
    }

    impl MockTransport {
        pub fn new(connected: bool) -> Arc<Self> {
            let mock = Self::default();
            mock.connected.store(connected, Ordering::SeqCst);
            Arc::new(mock)
        }

        pub fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }

        pub fn calls(&self) -> Vec<TransportCall> {
            lock(&self.calls).clone()
        }

        pub fn clear(&self) {
            lock(&self.calls).clear();
        }

        pub fn count(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
            lock(&self.calls).iter().filter(|c| pred(*c)).count()
        }

        fn record(&self, call: TransportCall) -> Result<(), DashboardError> {
            lock(&self.calls).push(call);
            if self.connected.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(DashboardError::NotConnected)
            }
        }
    }

    impl Transport for MockTransport {
        fn connect(&self, endpoint: &str) {
            lock(&self.calls).push(TransportCall::Connect(endpoint.to_string()));
        }

        fn close(&self) {
            lock(&self.calls).push(TransportCall::Close);
        }

        fn subscribe(&self, id: &str, topic: &str, msg_type: &str) -> Result<(), DashboardError> {
            self.record(TransportCall::Subscribe {
                id: id.to_string(),
                topic: topic.to_string(),
                msg_type: msg_type.to_string(),
            })
        }

        fn unsubscribe(&self, id: &str, topic: &str) -> Result<(), DashboardError> {
            self.record(TransportCall::Unsubscribe { id: id.to_string(), topic: topic.to_string() })
        }

        fn advertise(&self, topic: &str, msg_type: &str) -> Result<(), DashboardError> {
            self.record(TransportCall::Advertise { topic: topic.to_string(), msg_type: msg_type.to_string() })
        }

        fn unadvertise(&self, topic: &str) -> Result<(), DashboardError> {
            self.record(TransportCall::Unadvertise { topic: topic.to_string() })
        }

        fn publish(&self, topic: &str, msg: Value) -> Result<(), DashboardError> {
            self.record(TransportCall::Publish { topic: topic.to_string(), msg })
        }

        fn call_service(&self, id: &str, service: &str, service_type: &str, args: Value) -> Result<(), DashboardError> {
            self.record(TransportCall::CallService {
                id: id.to_string(),
                service: service.to_string(),
                service_type: service_type.to_string(),
                args,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calls_without_connection_are_declined() {
        let (transport, _events) = RosbridgeTransport::new();
        assert_eq!(transport.publish("/imu/data", Value::Null), Err(DashboardError::NotConnected));
        assert_eq!(transport.subscribe("s1", "/imu/data", "sensor_msgs/Imu"), Err(DashboardError::NotConnected));
        assert_eq!(
            transport.call_service("c1", "/example_service", "std_srvs/Trigger", Value::Null),
            Err(DashboardError::NotConnected)
        );
    }

    #[tokio::test]
    /// 连接失败时恰好上报一个 Error 事件。
    async fn test_failed_attempt_reports_single_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("绑定失败");
        let addr = listener.local_addr().expect("无法获取地址");
        drop(listener);

        let (transport, mut events) = RosbridgeTransport::new();
        transport.connect(&format!("ws://{}", addr));
        let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.recv())
            .await
            .expect("等待事件超时");
        assert!(matches!(event, Some(TransportEvent::Error(_))), "实际为 {:?}", event);
        assert!(events.try_recv().is_err(), "一次尝试只应有一个终止事件");
    }

    #[tokio::test]
    async fn test_invalid_endpoint_reports_error() {
        let (transport, mut events) = RosbridgeTransport::new();
        transport.connect("http://localhost:9090");
        let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.recv())
            .await
            .expect("等待事件超时");
        assert!(matches!(event, Some(TransportEvent::Error(_))));
    }
}

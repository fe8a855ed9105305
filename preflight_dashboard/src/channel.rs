// preflight_dashboard/src/channel.rs

//! 话题通道：某一个话题、某一种消息类型的订阅/发布句柄。
//!
//! 通道只读取会话管理器发布的 `connected` 信号，从不自行改变连接状态。
//! 信号变为真时 (重新) 创建订阅，变为假或通道被销毁时释放订阅；这两个动作都是幂等的。
//! 未连接时的发布被同步拒绝，不会排队，也不会触达传输层。

use crate::config::MonitorConfig;
use crate::error::DashboardError;
use crate::monitor::TopicMonitor;
use crate::transport::Transport;
use common_models::RosMessage;
use log::{debug, info, warn};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

/// 只发布、不订阅的话题句柄 (仿真器使用)。
pub struct Publisher<M: RosMessage> {
    topic: String,
    transport: Arc<dyn Transport>,
    connected: watch::Receiver<bool>,
    advertised: bool,
    _message: PhantomData<fn(M)>,
}

impl<M: RosMessage> Publisher<M> {
    pub fn new(topic: impl Into<String>, transport: Arc<dyn Transport>, connected: watch::Receiver<bool>) -> Self {
        Self {
            topic: topic.into(),
            transport,
            connected,
            advertised: false,
            _message: PhantomData,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// 发布一条消息；首次发布前先 advertise。未连接时返回 `NotConnected`。
    pub fn publish(&mut self, message: &M) -> Result<(), DashboardError> {
        if !self.is_connected() {
            return Err(DashboardError::NotConnected);
        }
        let msg = serde_json::to_value(message)?;
        if !self.advertised {
            self.transport.advertise(&self.topic, M::TYPE_NAME)?;
            self.advertised = true;
            debug!("[话题通道] 已声明发布 {} ({})", self.topic, M::TYPE_NAME);
        }
        self.transport.publish(&self.topic, msg)
    }

    /// 连接断开后 advertise 随连接一起失效，重连后需重新声明。
    pub fn sync_connection(&mut self) {
        if !self.is_connected() {
            self.advertised = false;
        }
    }

    /// 撤销发布声明 (若已声明)。
    pub fn release(&mut self) {
        if !self.advertised {
            return;
        }
        self.advertised = false;
        if self.is_connected() {
            if let Err(e) = self.transport.unadvertise(&self.topic) {
                debug!("[话题通道] 撤销 {} 的发布声明失败: {}", self.topic, e);
            }
        }
    }

    /// 更换话题；旧话题上的声明会先被撤销。
    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.release();
        self.topic = topic.into();
    }

    pub fn is_advertised(&self) -> bool {
        self.advertised
    }
}

/// 话题通道：一个订阅 + 最新消息 + 话题监视器，并可在同一话题上发布。
pub struct TopicChannel<M: RosMessage> {
    publisher: Publisher<M>,
    transport: Arc<dyn Transport>,
    connected: watch::Receiver<bool>,
    subscription_id: Option<String>,
    latest: Option<M>,
    monitor: TopicMonitor,
    decode_failures: u32,
}

impl<M: RosMessage> TopicChannel<M> {
    pub fn new(
        topic: impl Into<String>,
        transport: Arc<dyn Transport>,
        connected: watch::Receiver<bool>,
        monitor_config: &MonitorConfig,
    ) -> Self {
        Self {
            publisher: Publisher::new(topic, transport.clone(), connected.clone()),
            transport,
            connected,
            subscription_id: None,
            latest: None,
            monitor: TopicMonitor::new(monitor_config.window_size, monitor_config.liveness_timeout()),
            decode_failures: 0,
        }
    }

    pub fn topic(&self) -> &str {
        self.publisher.topic()
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// 按当前 `connected` 信号创建或释放订阅。重复调用没有副作用。
    pub fn sync_connection(&mut self, now: Instant) {
        self.publisher.sync_connection();
        match (self.is_connected(), self.subscription_id.is_some()) {
            (true, false) => self.subscribe(now),
            (false, true) => {
                // 连接已断开，订阅随连接一起失效，无需再通知网关
                debug!("[话题通道] 连接断开，{} 的订阅已失效。", self.topic());
                self.subscription_id = None;
                self.monitor.reset();
            }
            _ => {}
        }
    }

    fn subscribe(&mut self, now: Instant) {
        let id = format!("subscribe:{}:{}", self.topic(), Uuid::new_v4());
        match self.transport.subscribe(&id, self.topic(), M::TYPE_NAME) {
            Ok(()) => {
                info!("[话题通道] 已订阅 {} ({})", self.topic(), M::TYPE_NAME);
                self.subscription_id = Some(id);
                self.monitor.reset();
                self.monitor.start(now);
            }
            Err(e) => warn!("[话题通道] 订阅 {} 失败: {}", self.topic(), e),
        }
    }

    /// 处理一条到达的消息。话题不匹配或当前未订阅时返回 `false`。
    pub fn handle_message(&mut self, topic: &str, msg: &Value, now: Instant) -> bool {
        if self.subscription_id.is_none() || topic != self.topic() {
            return false;
        }
        match serde_json::from_value::<M>(msg.clone()) {
            Ok(message) => {
                self.decode_failures = 0;
                self.latest = Some(message);
                self.monitor.observe(now);
            }
            Err(e) => {
                self.decode_failures = self.decode_failures.saturating_add(1);
                if self.decode_failures == 1 {
                    warn!("[话题通道] {} 上的消息无法解析为 {}: {}", self.topic(), M::TYPE_NAME, e);
                } else {
                    debug!("[话题通道] {} 上的消息仍无法解析: {}", self.topic(), e);
                }
            }
        }
        true
    }

    /// 执行到期的存活检查。
    pub fn poll(&mut self, now: Instant) {
        if self.subscription_id.is_some() && self.monitor.poll(now) {
            warn!("[话题监视] {} 超过 {:?} 没有新消息，判定失活。", self.topic(), self.monitor.liveness_timeout());
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.subscription_id.as_ref().and(self.monitor.next_check())
    }

    pub fn publish(&mut self, message: &M) -> Result<(), DashboardError> {
        self.publisher.publish(message)
    }

    pub fn latest_message(&self) -> Option<&M> {
        self.latest.as_ref()
    }

    pub fn rate_at(&self, now: Instant) -> f64 {
        self.monitor.rate_at(now)
    }

    pub fn rate(&self) -> f64 {
        self.monitor.current_rate()
    }

    pub fn is_live_at(&self, now: Instant) -> bool {
        self.monitor.is_live_at(now)
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription_id.is_some()
    }

    /// 更换话题：释放旧订阅，已连接时立即订阅新话题。
    pub fn set_topic(&mut self, topic: impl Into<String>, now: Instant) {
        self.release();
        self.publisher.set_topic(topic);
        self.latest = None;
        self.sync_connection(now);
    }

    /// 释放订阅与发布声明 (unsubscribe + unadvertise)。
    pub fn release(&mut self) {
        if let Some(id) = self.subscription_id.take() {
            if self.is_connected() {
                match self.transport.unsubscribe(&id, self.topic()) {
                    Ok(()) => info!("[话题通道] 已取消订阅 {}", self.topic()),
                    Err(e) => debug!("[话题通道] 取消订阅 {} 失败: {}", self.topic(), e),
                }
            }
        }
        self.publisher.release();
        self.monitor.reset();
    }
}

impl<M: RosMessage> Drop for TopicChannel<M> {
    fn drop(&mut self) {
        self.release();
    }
}

// preflight_dashboard/src/session.rs

//! 会话管理器：持有进程内唯一的传输层句柄，维护连接状态机与重连定时器，
//! 并通过 `watch` 通道对外发布 `connected` 信号。
//!
//! 状态机由离散的传输事件驱动，时间以显式的 `Instant` 参数传入，
//! 运行时在最早的截止时间到达时调用 [`SessionManager::poll`]。
//!
//! 不变式：
//! - 任意时刻至多一个待触发的重连定时器；
//! - 重连定时器与 "已连接" 不会同时成立；
//! - 拆除 (`shutdown`) 之后不会再发起任何重连。

use crate::transport::{Transport, TransportEvent};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// 会话连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Disconnected => "未连接",
            ConnectionState::Connecting => "连接中",
            ConnectionState::Connected => "已连接",
        };
        f.write_str(text)
    }
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    endpoint: String,
    retry_interval: Duration,
    state: ConnectionState,
    retry_deadline: Option<Instant>,
    connected_tx: watch::Sender<bool>,
    torn_down: bool,
    /// 连续失败次数，只用于控制日志级别
    failure_streak: u32,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>, endpoint: impl Into<String>, retry_interval: Duration) -> Self {
        let (connected_tx, _) = watch::channel(false);
        Self {
            transport,
            endpoint: endpoint.into(),
            retry_interval,
            state: ConnectionState::Disconnected,
            retry_deadline: None,
            connected_tx,
            torn_down: false,
            failure_streak: 0,
        }
    }

    /// 发起连接。只在 `Disconnected` 状态下生效，拆除后不再生效。
    pub fn connect(&mut self) {
        if self.torn_down || self.state != ConnectionState::Disconnected {
            return;
        }
        if self.failure_streak == 0 {
            info!("[会话管理] 正在连接到 rosbridge: {}", self.endpoint);
        } else {
            debug!("[会话管理] 第 {} 次重连: {}", self.failure_streak, self.endpoint);
        }
        self.state = ConnectionState::Connecting;
        self.transport.connect(&self.endpoint);
    }

    /// 处理一个传输事件。`connected` 信号发生翻转时返回新值。
    pub fn handle_event(&mut self, event: &TransportEvent, now: Instant) -> Option<bool> {
        match event {
            TransportEvent::Connection => {
                if self.torn_down {
                    return None;
                }
                if self.retry_deadline.take().is_some() {
                    debug!("[会话管理] 已连接，取消尚未触发的重连定时器。");
                }
                self.failure_streak = 0;
                self.state = ConnectionState::Connected;
                info!("[会话管理] 已连接到 rosbridge: {}", self.endpoint);
                self.set_connected(true)
            }
            TransportEvent::Error(reason) => {
                self.on_connection_lost(now, Some(reason));
                self.set_connected(false)
            }
            TransportEvent::Close => {
                self.on_connection_lost(now, None);
                self.set_connected(false)
            }
            TransportEvent::Message { .. } | TransportEvent::ServiceResponse { .. } => None,
        }
    }

    fn on_connection_lost(&mut self, now: Instant, reason: Option<&String>) {
        let was_connected = self.state == ConnectionState::Connected;
        self.state = ConnectionState::Disconnected;
        if self.torn_down {
            debug!("[会话管理] 会话已拆除，忽略连接结束事件。");
            return;
        }

        self.failure_streak = self.failure_streak.saturating_add(1);
        match (was_connected, reason) {
            (true, Some(reason)) => warn!("[会话管理] 连接因错误中断: {}", reason),
            (true, None) => warn!("[会话管理] 连接已关闭。"),
            (false, Some(reason)) if self.failure_streak == 1 => {
                warn!("[会话管理] 连接 {} 失败: {}，将每 {:?} 重试一次。", self.endpoint, reason, self.retry_interval)
            }
            (false, Some(reason)) => debug!("[会话管理] 连接仍然失败: {}", reason),
            (false, None) => debug!("[会话管理] 连接尝试被关闭。"),
        }

        if self.retry_deadline.is_none() {
            self.retry_deadline = Some(now + self.retry_interval);
        }
    }

    fn set_connected(&mut self, connected: bool) -> Option<bool> {
        let previous = self.connected_tx.send_replace(connected);
        (previous != connected).then_some(connected)
    }

    /// 重连定时器到期时发起重连。
    pub fn poll(&mut self, now: Instant) {
        if let Some(deadline) = self.retry_deadline {
            if deadline <= now {
                self.retry_deadline = None;
                self.connect();
            }
        }
    }

    /// 拆除会话：取消待触发的重连，若连接存在则关闭传输层。之后不再重连。
    pub fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.retry_deadline = None;
        if self.state != ConnectionState::Disconnected {
            self.transport.close();
        }
        self.state = ConnectionState::Disconnected;
        self.set_connected(false);
        info!("[会话管理] 会话已拆除。");
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.retry_deadline
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn has_pending_retry(&self) -> bool {
        self.retry_deadline.is_some()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 订阅 `connected` 信号。
    pub fn connected_signal(&self) -> watch::Receiver<bool> {
        self.connected_tx.subscribe()
    }
}

// preflight_dashboard/src/service.rs

//! 服务调用器：通过 rosbridge `call_service` 调用 ROS 服务，并按 id 匹配响应。
//!
//! 每次调用恰好得到一次回复：成功响应、`result = false` 的失败、超时，
//! 或连接断开时的 `NotConnected`。未连接时调用被同步拒绝。

use crate::error::DashboardError;
use crate::transport::Transport;
use common_models::std_srvs::{Trigger, TriggerRequest, TriggerResponse};
use common_models::RosService;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

type ReplyFn = Box<dyn FnOnce(Result<Value, DashboardError>) + Send>;

struct PendingCall {
    service: String,
    deadline: Instant,
    reply: ReplyFn,
}

/// 最近一次触发式服务调用的状态 (加载中 / 结果 / 错误)。
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ServiceCallState {
    #[default]
    Idle,
    Loading { service: String },
    Succeeded { service: String, response: TriggerResponse },
    Failed { service: String, error: String },
}

impl ServiceCallState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ServiceCallState::Loading { .. })
    }
}

pub struct ServiceCaller {
    transport: Arc<dyn Transport>,
    connected: watch::Receiver<bool>,
    timeout: Duration,
    pending: HashMap<String, PendingCall>,
    next_seq: u64,
}

impl ServiceCaller {
    pub fn new(transport: Arc<dyn Transport>, connected: watch::Receiver<bool>, timeout: Duration) -> Self {
        Self {
            transport,
            connected,
            timeout,
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    /// 调用服务 `service`，响应到达 (或失败、超时) 时调用 `on_reply`。
    ///
    /// # Returns
    /// * `Ok(id)`：请求已交给传输层，`on_reply` 之后恰好被调用一次。
    /// * `Err(e)`：请求被同步拒绝，`on_reply` 不会被调用。
    pub fn call<S, F>(
        &mut self,
        service: &str,
        request: &S::Request,
        now: Instant,
        on_reply: F,
    ) -> Result<String, DashboardError>
    where
        S: RosService + 'static,
        F: FnOnce(Result<S::Response, DashboardError>) + Send + 'static,
    {
        if !*self.connected.borrow() {
            return Err(DashboardError::NotConnected);
        }
        let args = serde_json::to_value(request)?;
        self.next_seq += 1;
        let id = format!("call_service:{}:{}", service, self.next_seq);
        self.transport.call_service(&id, service, S::TYPE_NAME, args)?;
        debug!("[服务调用] 已发送 {} ({})，id: {}", service, S::TYPE_NAME, id);

        let reply: ReplyFn = Box::new(move |result: Result<Value, DashboardError>| {
            let decoded = result.and_then(|values| {
                serde_json::from_value::<S::Response>(values).map_err(|e| DashboardError::Serialization(e.to_string()))
            });
            on_reply(decoded);
        });
        self.pending.insert(
            id.clone(),
            PendingCall { service: service.to_string(), deadline: now + self.timeout, reply },
        );
        Ok(id)
    }

    /// 调用一个 `std_srvs/Trigger` 服务。
    pub fn call_trigger<F>(&mut self, service: &str, now: Instant, on_reply: F) -> Result<String, DashboardError>
    where
        F: FnOnce(Result<TriggerResponse, DashboardError>) + Send + 'static,
    {
        self.call::<Trigger, F>(service, &TriggerRequest {}, now, on_reply)
    }

    /// 处理一条服务响应。id 无法匹配到待处理调用时返回 `false`。
    pub fn on_response(&mut self, id: Option<&str>, service: &str, result: bool, values: Option<Value>) -> bool {
        let Some(call) = id.and_then(|id| self.pending.remove(id)) else {
            debug!("[服务调用] 忽略无法匹配的服务响应: {} (id: {:?})", service, id);
            return false;
        };
        if result {
            info!("[服务调用] {} 调用成功。", call.service);
            (call.reply)(Ok(values.unwrap_or_else(|| Value::Object(Default::default()))));
        } else {
            let message = match values {
                Some(Value::String(text)) => text,
                Some(other) => other.to_string(),
                None => format!("服务 {} 返回失败", call.service),
            };
            warn!("[服务调用] {} 调用失败: {}", call.service, message);
            (call.reply)(Err(DashboardError::ServiceCall(message)));
        }
        true
    }

    /// 让所有已超时的调用以 `ServiceTimeout` 结束。
    pub fn expire(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, call)| call.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            if let Some(call) = self.pending.remove(&id) {
                warn!("[服务调用] {} 在 {:?} 内未响应 (id: {})", call.service, self.timeout, id);
                (call.reply)(Err(DashboardError::ServiceTimeout {
                    service: call.service,
                    timeout_ms: self.timeout.as_millis() as u64,
                }));
            }
        }
    }

    /// 连接断开时，所有待处理调用以 `NotConnected` 结束。
    pub fn sync_connection(&mut self) {
        if *self.connected.borrow() || self.pending.is_empty() {
            return;
        }
        warn!("[服务调用] 连接断开，{} 个待处理的服务调用被取消。", self.pending.len());
        for (_, call) in self.pending.drain() {
            (call.reply)(Err(DashboardError::NotConnected));
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|call| call.deadline).min()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockTransport, TransportCall};
    use serde_json::json;
    use std::sync::Mutex;

    type Replies = Arc<Mutex<Vec<Result<TriggerResponse, DashboardError>>>>;

    fn caller(mock: &Arc<MockTransport>, connected: bool) -> (ServiceCaller, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(connected);
        (ServiceCaller::new(mock.clone(), rx, Duration::from_millis(5000)), tx)
    }

    fn recorder() -> (Replies, impl FnOnce(Result<TriggerResponse, DashboardError>) + Send + 'static) {
        let replies: Replies = Arc::new(Mutex::new(Vec::new()));
        let sink = replies.clone();
        (replies, move |r| sink.lock().unwrap().push(r))
    }

    #[test]
    fn test_declined_when_disconnected() {
        let mock = MockTransport::new(false);
        let (mut caller, _tx) = caller(&mock, false);
        let (replies, on_reply) = recorder();
        let result = caller.call_trigger("/example_service", Instant::now(), on_reply);
        assert_eq!(result, Err(DashboardError::NotConnected));
        assert!(mock.calls().is_empty());
        assert!(replies.lock().unwrap().is_empty());
    }

    #[test]
    fn test_success_response_is_matched_by_id() {
        let mock = MockTransport::new(true);
        let (mut caller, _tx) = caller(&mock, true);
        let (replies, on_reply) = recorder();
        let id = caller.call_trigger("/example_service", Instant::now(), on_reply).expect("调用被拒绝");

        assert_eq!(
            mock.calls()[0],
            TransportCall::CallService {
                id: id.clone(),
                service: "/example_service".into(),
                service_type: "std_srvs/Trigger".into(),
                args: json!({}),
            }
        );
        assert!(!caller.on_response(Some("other"), "/example_service", true, None));
        assert!(caller.on_response(
            Some(&id),
            "/example_service",
            true,
            Some(json!({"success": true, "message": "done"}))
        ));
        assert!(!caller.on_response(Some(&id), "/example_service", true, None), "同一 id 只回复一次");

        let replies = replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0], Ok(TriggerResponse { success: true, message: "done".into() }));
    }

    #[test]
    fn test_failed_result_carries_message() {
        let mock = MockTransport::new(true);
        let (mut caller, _tx) = caller(&mock, true);
        let (replies, on_reply) = recorder();
        let id = caller.call_trigger("/missing", Instant::now(), on_reply).expect("调用被拒绝");
        caller.on_response(Some(&id), "/missing", false, Some(json!("Service /missing does not exist")));
        assert_eq!(
            replies.lock().unwrap()[0],
            Err(DashboardError::ServiceCall("Service /missing does not exist".into()))
        );
    }

    #[test]
    fn test_undecodable_values_are_serialization_errors() {
        let mock = MockTransport::new(true);
        let (mut caller, _tx) = caller(&mock, true);
        let (replies, on_reply) = recorder();
        let id = caller.call_trigger("/example_service", Instant::now(), on_reply).expect("调用被拒绝");
        caller.on_response(Some(&id), "/example_service", true, Some(json!({"success": "yes"})));
        assert!(matches!(replies.lock().unwrap()[0], Err(DashboardError::Serialization(_))));
    }

    #[test]
    fn test_timeout_expires_call_once() {
        let mock = MockTransport::new(true);
        let (mut caller, _tx) = caller(&mock, true);
        let (replies, on_reply) = recorder();
        let t0 = Instant::now();
        caller.call_trigger("/slow", t0, on_reply).expect("调用被拒绝");
        assert_eq!(caller.next_deadline(), Some(t0 + Duration::from_millis(5000)));

        caller.expire(t0 + Duration::from_millis(4999));
        assert_eq!(caller.pending_count(), 1);
        caller.expire(t0 + Duration::from_millis(5000));
        caller.expire(t0 + Duration::from_millis(9000));
        let replies = replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0], Err(DashboardError::ServiceTimeout { service: "/slow".into(), timeout_ms: 5000 }));
    }

    #[test]
    fn test_disconnect_fails_pending_calls() {
        let mock = MockTransport::new(true);
        let (mut caller, tx) = caller(&mock, true);
        let (replies, on_reply) = recorder();
        caller.call_trigger("/example_service", Instant::now(), on_reply).expect("调用被拒绝");

        tx.send_replace(false);
        caller.sync_connection();
        assert_eq!(caller.pending_count(), 0);
        assert_eq!(replies.lock().unwrap()[0], Err(DashboardError::NotConnected));
    }

    #[test]
    fn test_state_default_is_idle() {
        let state = ServiceCallState::default();
        assert_eq!(state, ServiceCallState::Idle);
        assert!(ServiceCallState::Loading { service: "/s".into() }.is_loading());
    }
}

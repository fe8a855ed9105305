// preflight_dashboard/src/dashboard.rs

//! 仪表盘运行时。
//!
//! 一个 `Dashboard` 值拥有会话管理器、三个预检话题通道、仿真器、服务调用器和界面偏好，
//! 并在单一任务中用 `tokio::select!` 依次处理：传输事件、操作员命令、服务调用结果，
//! 以及最早到期的截止时间 (重连定时器、仿真节拍、存活检查、服务超时、状态输出)。
//! 所有状态只有这一个写者，因此组件本身都是不含锁的同步状态机。
//!
//! 外部通过 [`DashboardHandle`] 发送命令并等待回复。

use crate::channel::{Publisher, TopicChannel};
use crate::config::AppConfig;
use crate::error::DashboardError;
use crate::prefs::PreferenceStore;
use crate::service::{ServiceCallState, ServiceCaller};
use crate::session::{ConnectionState, SessionManager};
use crate::simulation::{TelemetrySimulator, DEPTH_TOPIC, DVL_TOPIC, IMU_TOPIC};
use crate::transport::{Transport, TransportEvent};
use crate::views::{FeedHealth, PreflightReport, SimulationPanel};
use common_models::enums::Scenario;
use common_models::geometry_msgs::PoseWithCovarianceStamped;
use common_models::nav_msgs::Odometry;
use common_models::sensor_msgs::Imu;
use common_models::std_msgs::StringMsg;
use common_models::std_srvs::TriggerResponse;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::time::{sleep_until, timeout, Instant};

/// 命令通道容量
const COMMAND_BUFFER: usize = 32;
/// 退出时等待传输层确认关闭的最长时间
const CLOSE_GRACE: Duration = Duration::from_millis(500);

type TriggerReply = oneshot::Sender<Result<TriggerResponse, DashboardError>>;

/// 操作员命令
#[derive(Debug)]
pub enum DashboardCommand {
    StartSimulation { reply: oneshot::Sender<Result<bool, DashboardError>> },
    StopSimulation { reply: oneshot::Sender<bool> },
    SelectScenario { scenario: Scenario, reply: oneshot::Sender<Result<(), DashboardError>> },
    /// `expanded` 为 `None` 时切换展开状态
    SetExpanded { expanded: Option<bool>, reply: oneshot::Sender<bool> },
    /// `service` 为 `None` 时调用配置中的默认触发式服务
    CallTrigger { service: Option<String>, reply: TriggerReply },
    PublishText { text: String, reply: oneshot::Sender<Result<(), DashboardError>> },
    Snapshot { reply: oneshot::Sender<DashboardSnapshot> },
    Shutdown,
}

/// 仪表盘在某一时刻的完整视图
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub endpoint: String,
    pub connection: ConnectionState,
    pub retry_pending: bool,
    pub report: PreflightReport,
    pub panel: SimulationPanel,
    pub sim_time: Option<f64>,
}

impl fmt::Display for DashboardSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rosbridge {} : {}", self.endpoint, self.connection)?;
        if self.retry_pending {
            f.write_str(" (等待重连)")?;
        }
        writeln!(f)?;
        write!(f, "{}", self.report)?;
        write!(f, "  {}", self.panel)?;
        if let Some(t) = self.sim_time {
            write!(f, " | t = {:.1} s", t)?;
        }
        Ok(())
    }
}

/// 服务调用结果，由回复闭包送回运行时任务
struct TriggerOutcome {
    token: u64,
    service: String,
    result: Result<TriggerResponse, DashboardError>,
}

pub struct Dashboard {
    config: AppConfig,
    session: SessionManager,
    imu: TopicChannel<Imu>,
    depth: TopicChannel<PoseWithCovarianceStamped>,
    dvl: TopicChannel<Odometry>,
    command_publisher: Publisher<StringMsg>,
    simulator: TelemetrySimulator,
    services: ServiceCaller,
    prefs: PreferenceStore,
    scenario: Scenario,
    expanded: bool,
    last_call: ServiceCallState,
    trigger_replies: HashMap<u64, TriggerReply>,
    next_token: u64,
    next_status: Option<Instant>,
    events: UnboundedReceiver<TransportEvent>,
    commands: mpsc::Receiver<DashboardCommand>,
    outcomes_tx: UnboundedSender<TriggerOutcome>,
    outcomes_rx: UnboundedReceiver<TriggerOutcome>,
}

impl Dashboard {
    pub fn new(
        config: AppConfig,
        transport: Arc<dyn Transport>,
        events: UnboundedReceiver<TransportEvent>,
        prefs: PreferenceStore,
    ) -> (Self, DashboardHandle) {
        let session = SessionManager::new(
            transport.clone(),
            config.rosbridge.url.clone(),
            Duration::from_millis(config.rosbridge.reconnect_interval_ms),
        );
        let connected = session.connected_signal();
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let scenario = prefs.scenario();
        let expanded = prefs.expanded();
        info!(
            "[仪表盘] 已恢复界面偏好: 场景 {}, 面板{}",
            scenario.label(),
            if expanded { "展开" } else { "收起" }
        );

        let dashboard = Self {
            imu: TopicChannel::new(IMU_TOPIC, transport.clone(), connected.clone(), &config.monitor),
            depth: TopicChannel::new(DEPTH_TOPIC, transport.clone(), connected.clone(), &config.monitor),
            dvl: TopicChannel::new(DVL_TOPIC, transport.clone(), connected.clone(), &config.monitor),
            command_publisher: Publisher::new(config.ui.command_topic.clone(), transport.clone(), connected.clone()),
            simulator: TelemetrySimulator::new(&config.simulation, transport.clone(), connected.clone()),
            services: ServiceCaller::new(
                transport,
                connected,
                Duration::from_millis(config.services.call_timeout_ms),
            ),
            session,
            prefs,
            scenario,
            expanded,
            last_call: ServiceCallState::Idle,
            trigger_replies: HashMap::new(),
            next_token: 0,
            next_status: None,
            events,
            commands,
            outcomes_tx,
            outcomes_rx,
            config,
        };
        (dashboard, DashboardHandle { commands: commands_tx })
    }

    /// 运行直到收到 `Shutdown` 命令或所有句柄都被丢弃。
    pub async fn run(mut self) {
        info!("[仪表盘] 运行时已启动。");
        self.session.connect();
        self.next_status = self.status_interval().map(|interval| Instant::now() + interval);

        loop {
            let deadline = self.next_deadline();
            let wake = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_transport_event(event, Instant::now()),
                    None => {
                        error!("[仪表盘] 传输层事件通道已关闭，运行时退出。");
                        break;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(DashboardCommand::Shutdown) | None => {
                        info!("[仪表盘] 收到退出请求。");
                        break;
                    }
                    Some(command) => self.handle_command(command, Instant::now()),
                },
                Some(outcome) = self.outcomes_rx.recv() => self.finish_trigger_call(outcome),
                _ = wake => self.poll(Instant::now()),
            }
        }

        self.shutdown().await;
    }

    fn status_interval(&self) -> Option<Duration> {
        match self.config.ui.status_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.session.next_deadline(),
            self.imu.next_deadline(),
            self.depth.next_deadline(),
            self.dvl.next_deadline(),
            self.simulator.next_deadline(),
            self.services.next_deadline(),
            self.next_status,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// 执行所有到期的定时工作。
    pub fn poll(&mut self, now: Instant) {
        self.session.poll(now);
        self.imu.poll(now);
        self.depth.poll(now);
        self.dvl.poll(now);
        self.simulator.poll(now);
        self.services.expire(now);

        if let (Some(due), Some(interval)) = (self.next_status, self.status_interval()) {
            if due <= now {
                info!("[仪表盘] 预检状态:\n{}", self.snapshot(now));
                self.next_status = Some(now + interval);
            }
        }
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Message { topic, msg } => {
                let handled = self.imu.handle_message(&topic, &msg, now)
                    || self.depth.handle_message(&topic, &msg, now)
                    || self.dvl.handle_message(&topic, &msg, now);
                if !handled {
                    debug!("[仪表盘] 忽略未订阅话题 {} 上的消息。", topic);
                }
            }
            TransportEvent::ServiceResponse { id, service, result, values } => {
                self.services.on_response(id.as_deref(), &service, result, values);
            }
            lifecycle => {
                if let Some(connected) = self.session.handle_event(&lifecycle, now) {
                    self.on_connection_changed(connected, now);
                }
            }
        }
    }

    fn on_connection_changed(&mut self, connected: bool, now: Instant) {
        info!("[仪表盘] 连接状态变为: {}", if connected { "已连接" } else { "未连接" });
        self.imu.sync_connection(now);
        self.depth.sync_connection(now);
        self.dvl.sync_connection(now);
        self.command_publisher.sync_connection();
        self.simulator.sync_connection();
        self.services.sync_connection();
    }

    pub fn handle_command(&mut self, command: DashboardCommand, now: Instant) {
        match command {
            DashboardCommand::StartSimulation { reply } => {
                let _ = reply.send(self.start_simulation(now));
            }
            DashboardCommand::StopSimulation { reply } => {
                let _ = reply.send(self.simulator.stop());
            }
            DashboardCommand::SelectScenario { scenario, reply } => {
                let _ = reply.send(self.select_scenario(scenario));
            }
            DashboardCommand::SetExpanded { expanded, reply } => {
                self.expanded = expanded.unwrap_or(!self.expanded);
                self.prefs.set_expanded(self.expanded);
                let _ = reply.send(self.expanded);
            }
            DashboardCommand::CallTrigger { service, reply } => {
                let service = service.unwrap_or_else(|| self.config.services.trigger_service.clone());
                self.call_trigger(service, reply, now);
            }
            DashboardCommand::PublishText { text, reply } => {
                let result = self.command_publisher.publish(&StringMsg { data: text });
                if let Err(e) = &result {
                    warn!("[仪表盘] 发布到 {} 失败: {}", self.command_publisher.topic(), e);
                }
                let _ = reply.send(result);
            }
            DashboardCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot(now));
            }
            DashboardCommand::Shutdown => {}
        }
    }

    fn start_simulation(&mut self, now: Instant) -> Result<bool, DashboardError> {
        if !self.session.is_connected() {
            return Err(DashboardError::NotConnected);
        }
        Ok(self.simulator.start(self.scenario, now))
    }

    fn select_scenario(&mut self, scenario: Scenario) -> Result<(), DashboardError> {
        if self.simulator.is_running() {
            return Err(DashboardError::SimulationRunning);
        }
        self.scenario = scenario;
        self.prefs.set_scenario(scenario);
        info!("[仪表盘] 已选择场景: {}", scenario.label());
        Ok(())
    }

    fn call_trigger(&mut self, service: String, reply: TriggerReply, now: Instant) {
        self.next_token += 1;
        let token = self.next_token;
        let outcomes = self.outcomes_tx.clone();
        let reply_service = service.clone();
        let on_reply = move |result| {
            let _ = outcomes.send(TriggerOutcome { token, service: reply_service, result });
        };

        match self.services.call_trigger(&service, now, on_reply) {
            Ok(_) => {
                self.trigger_replies.insert(token, reply);
                self.last_call = ServiceCallState::Loading { service };
            }
            Err(e) => {
                warn!("[仪表盘] 调用服务 {} 被拒绝: {}", service, e);
                self.last_call = ServiceCallState::Failed { service, error: e.to_string() };
                let _ = reply.send(Err(e));
            }
        }
    }

    fn finish_trigger_call(&mut self, outcome: TriggerOutcome) {
        let TriggerOutcome { token, service, result } = outcome;
        self.last_call = match &result {
            Ok(response) => ServiceCallState::Succeeded { service, response: response.clone() },
            Err(e) => ServiceCallState::Failed { service, error: e.to_string() },
        };
        if let Some(reply) = self.trigger_replies.remove(&token) {
            let _ = reply.send(result);
        }
    }

    pub fn snapshot(&self, now: Instant) -> DashboardSnapshot {
        DashboardSnapshot {
            endpoint: self.session.endpoint().to_string(),
            connection: self.session.state(),
            retry_pending: self.session.has_pending_retry(),
            report: PreflightReport {
                imu: FeedHealth::new("imu", "Imu", self.imu.rate_at(now)),
                dvl: FeedHealth::new("dvl", "dvl", self.dvl.rate_at(now)),
                depth: FeedHealth::new("depth", "Depth", self.depth.rate_at(now)),
                imu_msg: self.imu.latest_message().cloned(),
                dvl_msg: self.dvl.latest_message().cloned(),
                depth_msg: self.depth.latest_message().cloned(),
            },
            panel: SimulationPanel {
                running: self.simulator.is_running(),
                scenario: self.scenario,
                expanded: self.expanded,
                last_call: self.last_call.clone(),
            },
            sim_time: self.simulator.state().map(|s| s.sim_time),
        }
    }

    /// 停止仿真，释放全部通道，取消重连并关闭传输层，然后短暂等待连接关闭。
    async fn shutdown(&mut self) {
        let was_open = self.session.state() != ConnectionState::Disconnected;
        self.teardown();
        if !was_open {
            return;
        }
        let closed = timeout(CLOSE_GRACE, async {
            while let Some(event) = self.events.recv().await {
                if matches!(event, TransportEvent::Close | TransportEvent::Error(_)) {
                    break;
                }
            }
        })
        .await;
        if closed.is_err() {
            debug!("[仪表盘] 等待传输层关闭超时，直接退出。");
        }
        info!("[仪表盘] 运行时已退出。");
    }

    /// 同步的拆除步骤。
    pub fn teardown(&mut self) {
        self.simulator.stop();
        self.simulator.release();
        self.imu.release();
        self.depth.release();
        self.dvl.release();
        self.command_publisher.release();
        self.session.shutdown();
        self.services.sync_connection();
    }
}

/// 向运行时发送命令的句柄，可克隆。
#[derive(Debug, Clone)]
pub struct DashboardHandle {
    commands: mpsc::Sender<DashboardCommand>,
}

impl DashboardHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> DashboardCommand) -> Result<T, DashboardError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| DashboardError::DashboardStopped)?;
        response.await.map_err(|_| DashboardError::DashboardStopped)
    }

    /// 以当前选择的场景开始仿真。已在运行时返回 `Ok(false)`。
    pub async fn start_simulation(&self) -> Result<bool, DashboardError> {
        self.request(|reply| DashboardCommand::StartSimulation { reply }).await?
    }

    pub async fn stop_simulation(&self) -> Result<bool, DashboardError> {
        self.request(|reply| DashboardCommand::StopSimulation { reply }).await
    }

    pub async fn select_scenario(&self, scenario: Scenario) -> Result<(), DashboardError> {
        self.request(|reply| DashboardCommand::SelectScenario { scenario, reply }).await?
    }

    pub async fn set_expanded(&self, expanded: bool) -> Result<bool, DashboardError> {
        self.request(|reply| DashboardCommand::SetExpanded { expanded: Some(expanded), reply }).await
    }

    pub async fn toggle_expanded(&self) -> Result<bool, DashboardError> {
        self.request(|reply| DashboardCommand::SetExpanded { expanded: None, reply }).await
    }

    pub async fn call_trigger(&self, service: Option<String>) -> Result<TriggerResponse, DashboardError> {
        self.request(|reply| DashboardCommand::CallTrigger { service, reply }).await?
    }

    pub async fn publish_text(&self, text: String) -> Result<(), DashboardError> {
        self.request(|reply| DashboardCommand::PublishText { text, reply }).await?
    }

    pub async fn snapshot(&self) -> Result<DashboardSnapshot, DashboardError> {
        self.request(|reply| DashboardCommand::Snapshot { reply }).await
    }

    /// 请求运行时退出；运行时已停止时什么也不做。
    pub async fn shutdown(&self) {
        let _ = self.commands.send(DashboardCommand::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockTransport, TransportCall};
    use serde_json::json;

    struct Fixture {
        dashboard: Dashboard,
        mock: Arc<MockTransport>,
        _handle: DashboardHandle,
        _events: UnboundedSender<TransportEvent>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("无法创建临时目录");
        let mut config = AppConfig::default();
        config.simulation.noise_seed = Some(3);
        config.ui.status_interval_ms = 0;
        let prefs = PreferenceStore::load(dir.path().join("ui_prefs.json"));
        let mock = MockTransport::new(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (dashboard, handle) = Dashboard::new(config, mock.clone(), events_rx, prefs);
        Fixture { dashboard, mock, _handle: handle, _events: events_tx, _dir: dir }
    }

    fn connect(f: &mut Fixture, now: Instant) {
        f.dashboard.session.connect();
        f.mock.set_connected(true);
        f.dashboard.handle_transport_event(TransportEvent::Connection, now);
    }

    fn command<T>(f: &mut Fixture, now: Instant, build: impl FnOnce(oneshot::Sender<T>) -> DashboardCommand) -> T {
        let (tx, mut rx) = oneshot::channel();
        f.dashboard.handle_command(build(tx), now);
        rx.try_recv().expect("命令应同步得到回复")
    }

    #[test]
    fn test_connection_subscribes_all_feeds() {
        let mut f = fixture();
        connect(&mut f, Instant::now());
        let topics: Vec<String> = f
            .mock
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::Subscribe { topic, .. } => Some(topic),
                _ => None,
            })
            .collect();
        assert_eq!(topics, vec![IMU_TOPIC, DEPTH_TOPIC, DVL_TOPIC]);
    }

    #[test]
    fn test_start_declined_while_disconnected() {
        let mut f = fixture();
        let result = command(&mut f, Instant::now(), |reply| DashboardCommand::StartSimulation { reply });
        assert_eq!(result, Err(DashboardError::NotConnected));
        assert!(!f.dashboard.simulator.is_running());
    }

    #[test]
    fn test_scenario_change_declined_while_running() {
        let mut f = fixture();
        let now = Instant::now();
        connect(&mut f, now);
        let selected = command(&mut f, now, |reply| DashboardCommand::SelectScenario { scenario: Scenario::Dive, reply });
        assert_eq!(selected, Ok(()));
        assert_eq!(command(&mut f, now, |reply| DashboardCommand::StartSimulation { reply }), Ok(true));

        let again = command(&mut f, now, |reply| DashboardCommand::SelectScenario { scenario: Scenario::Circle, reply });
        assert_eq!(again, Err(DashboardError::SimulationRunning));
        assert_eq!(f.dashboard.prefs.scenario(), Scenario::Dive);

        assert!(command(&mut f, now, |reply| DashboardCommand::StopSimulation { reply }));
        let after_stop = command(&mut f, now, |reply| DashboardCommand::SelectScenario { scenario: Scenario::Circle, reply });
        assert_eq!(after_stop, Ok(()));
    }

    #[test]
    fn test_toggle_expanded_persists() {
        let mut f = fixture();
        let now = Instant::now();
        assert!(command(&mut f, now, |reply| DashboardCommand::SetExpanded { expanded: None, reply }));
        assert!(f.dashboard.prefs.expanded());
        assert!(!command(&mut f, now, |reply| DashboardCommand::SetExpanded { expanded: None, reply }));
        assert!(!f.dashboard.prefs.expanded());
    }

    #[test]
    /// 仿真数据经网关回环后，通道得到最新消息与频率。
    fn test_loopback_messages_reach_report() {
        let mut f = fixture();
        let t0 = Instant::now();
        connect(&mut f, t0);
        for i in 0..4u64 {
            let at = t0 + Duration::from_millis(100 * i);
            let msg = json!({"header": {"stamp": {"sec": 0, "nanosec": 0}, "frame_id": "imu_link"},
                             "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0},
                             "angular_velocity": {"x": 0.0, "y": 0.0, "z": 0.0},
                             "linear_acceleration": {"x": 0.0, "y": 0.0, "z": 9.81}});
            f.dashboard.handle_transport_event(TransportEvent::Message { topic: IMU_TOPIC.into(), msg }, at);
        }
        let snapshot = f.dashboard.snapshot(t0 + Duration::from_millis(300));
        assert!((snapshot.report.imu.rate - 10.0).abs() < 1e-6);
        assert_eq!(snapshot.report.dead_feed_lines(), vec!["dvl lost!", "depth lost!"]);
        assert_eq!(snapshot.connection, ConnectionState::Connected);
    }

    #[test]
    fn test_trigger_call_updates_state_and_replies() {
        let mut f = fixture();
        let now = Instant::now();
        connect(&mut f, now);

        let (tx, mut rx) = oneshot::channel();
        f.dashboard.handle_command(DashboardCommand::CallTrigger { service: None, reply: tx }, now);
        assert!(f.dashboard.last_call.is_loading());

        let id = f
            .mock
            .calls()
            .into_iter()
            .find_map(|c| match c {
                TransportCall::CallService { id, service, .. } if service == "/example_service" => Some(id),
                _ => None,
            })
            .expect("应发出 call_service");
        f.dashboard.handle_transport_event(
            TransportEvent::ServiceResponse {
                id: Some(id),
                service: "/example_service".into(),
                result: true,
                values: Some(json!({"success": true, "message": "ok"})),
            },
            now,
        );
        let outcome = f.dashboard.outcomes_rx.try_recv().expect("应产生调用结果");
        f.dashboard.finish_trigger_call(outcome);

        let expected = TriggerResponse { success: true, message: "ok".into() };
        assert_eq!(rx.try_recv().expect("应得到回复"), Ok(expected.clone()));
        assert_eq!(
            f.dashboard.last_call,
            ServiceCallState::Succeeded { service: "/example_service".into(), response: expected }
        );
    }

    #[test]
    fn test_trigger_call_declined_when_disconnected() {
        let mut f = fixture();
        let result = command(&mut f, Instant::now(), |reply| DashboardCommand::CallTrigger { service: Some("/x".into()), reply });
        assert_eq!(result, Err(DashboardError::NotConnected));
        assert!(matches!(f.dashboard.last_call, ServiceCallState::Failed { .. }));
    }

    #[test]
    fn test_connection_loss_schedules_retry_and_drops_subscriptions() {
        let mut f = fixture();
        let t0 = Instant::now();
        connect(&mut f, t0);
        f.mock.set_connected(false);
        f.dashboard.handle_transport_event(TransportEvent::Close, t0);

        assert!(!f.dashboard.imu.is_subscribed());
        assert_eq!(f.dashboard.next_deadline(), Some(t0 + Duration::from_millis(1000)));
        f.dashboard.poll(t0 + Duration::from_millis(1000));
        assert_eq!(f.mock.count(|c| matches!(c, TransportCall::Connect(_))), 2);
    }

    #[test]
    fn test_teardown_order() {
        let mut f = fixture();
        let now = Instant::now();
        connect(&mut f, now);
        command(&mut f, now, |reply| DashboardCommand::StartSimulation { reply }).expect("应能启动仿真");
        f.dashboard.poll(now + Duration::from_millis(100));
        f.mock.clear();

        f.dashboard.teardown();
        let calls = f.mock.calls();
        let close_at = calls.iter().position(|c| *c == TransportCall::Close).expect("应关闭传输层");
        assert_eq!(close_at, calls.len() - 1, "关闭传输层是最后一步");
        assert_eq!(calls.iter().filter(|c| matches!(c, TransportCall::Unsubscribe { .. })).count(), 3);
        assert_eq!(calls.iter().filter(|c| matches!(c, TransportCall::Unadvertise { .. })).count(), 3);
        assert!(!f.dashboard.simulator.is_running());
        assert!(!f.dashboard.session.has_pending_retry());
    }

    #[tokio::test]
    async fn test_handle_reports_stopped_runtime() {
        let f = fixture();
        let handle = f._handle.clone();
        drop(f);
        assert_eq!(handle.snapshot().await, Err(DashboardError::DashboardStopped));
    }
}

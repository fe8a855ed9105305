// preflight_dashboard/tests/dashboard_loopback_test.rs

use common_models::std_srvs::TriggerResponse;
use common_models::enums::Scenario;
use log::LevelFilter;
use preflight_dashboard::config::AppConfig;
use preflight_dashboard::dashboard::{Dashboard, DashboardHandle, DashboardSnapshot};
use preflight_dashboard::error::DashboardError;
use preflight_dashboard::prefs::PreferenceStore;
use preflight_dashboard::session::ConnectionState;
use preflight_dashboard::transport::RosbridgeTransport;
use rust_websocket_utils::server::bridge::LoopbackBridge;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

fn init_test_logger() {
    let _ = env_logger::builder().filter_level(LevelFilter::Info).is_test(true).try_init();
}

async fn start_bridge(listener: TcpListener) -> (Arc<LoopbackBridge>, JoinHandle<()>) {
    let bridge = LoopbackBridge::new();
    bridge.register_trigger("/example_service", TriggerResponse { success: true, message: "armed".to_string() });
    let serving = bridge.clone();
    let handle = tokio::spawn(async move {
        let _ = serving.serve(listener).await;
    });
    (bridge, handle)
}

fn test_config(addr: SocketAddr) -> AppConfig {
    let mut config = AppConfig::default();
    config.rosbridge.url = format!("ws://{}", addr);
    config.rosbridge.reconnect_interval_ms = 200;
    config.simulation.noise_seed = Some(11);
    config.ui.status_interval_ms = 0;
    config
}

fn start_dashboard(config: AppConfig, dir: &tempfile::TempDir) -> (DashboardHandle, JoinHandle<()>) {
    let prefs = PreferenceStore::load(dir.path().join("ui_prefs.json"));
    let (transport, events) = RosbridgeTransport::new();
    let (dashboard, handle) = Dashboard::new(config, Arc::new(transport), events, prefs);
    (handle, tokio::spawn(dashboard.run()))
}

/// 反复获取快照直到满足条件，超时则失败。
async fn wait_for(
    handle: &DashboardHandle,
    what: &str,
    pred: impl Fn(&DashboardSnapshot) -> bool,
) -> DashboardSnapshot {
    let result = timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = handle.snapshot().await.expect("仪表盘已停止");
            if pred(&snapshot) {
                return snapshot;
            }
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    match result {
        Ok(snapshot) => snapshot,
        Err(_) => panic!("等待 {} 超时，最后状态: {:?}", what, handle.snapshot().await),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
/// 仿真数据经回环网关回到三个预检通道，频率接近 10 Hz；服务调用得到结果。
async fn test_simulated_telemetry_loops_back_through_bridge() {
    init_test_logger();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
    let addr = listener.local_addr().expect("无法获取本地监听地址");
    let (_bridge, bridge_task) = start_bridge(listener).await;
    let dir = tempfile::tempdir().expect("无法创建临时目录");
    let (handle, dashboard_task) = start_dashboard(test_config(addr), &dir);

    wait_for(&handle, "连接建立", |s| s.connection == ConnectionState::Connected).await;
    handle.select_scenario(Scenario::Circle).await.expect("选择场景失败");
    assert_eq!(handle.start_simulation().await, Ok(true));
    assert_eq!(handle.start_simulation().await, Ok(false));
    assert_eq!(handle.select_scenario(Scenario::Dive).await, Err(DashboardError::SimulationRunning));

    let snapshot = wait_for(&handle, "三路数据存活", |s| {
        s.report.dead_feed_lines().is_empty() && s.report.imu.rate > 0.0 && s.report.imu_msg.is_some()
    })
    .await;
    assert_eq!(snapshot.panel.scenario, Scenario::Circle);
    assert!(snapshot.panel.running);

    sleep(Duration::from_millis(1200)).await;
    let snapshot = handle.snapshot().await.expect("仪表盘已停止");
    for feed in [&snapshot.report.imu, &snapshot.report.dvl, &snapshot.report.depth] {
        assert!(feed.rate > 5.0 && feed.rate < 20.0, "{} 的频率异常: {}", feed.name, feed.rate);
    }

    let response = handle.call_trigger(None).await.expect("服务调用失败");
    assert_eq!(response, TriggerResponse { success: true, message: "armed".to_string() });
    match handle.call_trigger(Some("/missing".to_string())).await {
        Err(DashboardError::ServiceCall(message)) => assert!(message.contains("/missing")),
        other => panic!("预期 ServiceCall 错误，实际为 {:?}", other),
    }

    assert_eq!(handle.stop_simulation().await, Ok(true));
    handle.shutdown().await;
    timeout(Duration::from_secs(5), dashboard_task).await.expect("仪表盘未能按时退出").expect("仪表盘任务异常");
    bridge_task.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
/// 网关晚于仪表盘启动：仪表盘按固定间隔重试，网关出现后自动连上。
async fn test_dashboard_reconnects_when_bridge_appears() {
    init_test_logger();
    let probe = TcpListener::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
    let addr = probe.local_addr().expect("无法获取本地监听地址");
    drop(probe);

    let dir = tempfile::tempdir().expect("无法创建临时目录");
    let (handle, dashboard_task) = start_dashboard(test_config(addr), &dir);

    let snapshot = wait_for(&handle, "首次连接失败", |s| s.retry_pending).await;
    assert_ne!(snapshot.connection, ConnectionState::Connected);
    assert_eq!(handle.publish_text("hello".to_string()).await, Err(DashboardError::NotConnected));
    assert_eq!(handle.start_simulation().await, Err(DashboardError::NotConnected));

    let listener = TcpListener::bind(addr).await.expect("无法重新绑定端口");
    let (_bridge, bridge_task) = start_bridge(listener).await;

    let snapshot = wait_for(&handle, "重连成功", |s| s.connection == ConnectionState::Connected).await;
    assert!(!snapshot.retry_pending);
    assert_eq!(handle.publish_text("hello".to_string()).await, Ok(()));

    handle.shutdown().await;
    timeout(Duration::from_secs(5), dashboard_task).await.expect("仪表盘未能按时退出").expect("仪表盘任务异常");
    bridge_task.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
/// 网关关闭后通道失活，仪表盘进入重连。
async fn test_bridge_loss_marks_feeds_dead_and_retries() {
    init_test_logger();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
    let addr = listener.local_addr().expect("无法获取本地监听地址");
    let (_bridge, bridge_task) = start_bridge(listener).await;
    let dir = tempfile::tempdir().expect("无法创建临时目录");
    let (handle, dashboard_task) = start_dashboard(test_config(addr), &dir);

    wait_for(&handle, "连接建立", |s| s.connection == ConnectionState::Connected).await;
    handle.start_simulation().await.expect("启动仿真失败");
    wait_for(&handle, "IMU 存活", |s| s.report.imu.rate > 0.0).await;

    bridge_task.abort();
    let snapshot = wait_for(&handle, "连接丢失", |s| s.connection != ConnectionState::Connected).await;
    assert_eq!(snapshot.report.dead_feed_lines(), vec!["imu lost!", "dvl lost!", "depth lost!"]);

    handle.shutdown().await;
    timeout(Duration::from_secs(5), dashboard_task).await.expect("仪表盘未能按时退出").expect("仪表盘任务异常");
}

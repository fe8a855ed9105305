use anyhow::Context;
use common_models::std_srvs::TriggerResponse;
use log::{info, LevelFilter};
use preflight_dashboard::config::{load_or_create_config, resolve_config_path};
use rust_websocket_utils::server::bridge::LoopbackBridge;
use tokio::net::TcpListener;

/// 不接机器人时使用的本地 rosbridge 替身：话题回环 + 一个总是成功的触发式服务。
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .init();

    let config = load_or_create_config(&resolve_config_path(std::env::args().nth(1)));
    let listen_addr = config.bridge.listen_addr.clone();

    let bridge = LoopbackBridge::new();
    bridge.register_trigger(
        &config.services.trigger_service,
        TriggerResponse { success: true, message: "triggered".to_string() },
    );

    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("无法绑定回环网关监听地址 {}", listen_addr))?;
    info!("[回环网关] 正在监听 ws://{}", listen_addr);

    tokio::select! {
        result = bridge.clone().serve(listener) => result.context("回环网关异常退出")?,
        _ = tokio::signal::ctrl_c() => info!("[回环网关] 收到 Ctrl-C，正在退出..."),
    }
    Ok(())
}

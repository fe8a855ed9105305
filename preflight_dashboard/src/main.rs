use log::{info, warn, LevelFilter};
use preflight_dashboard::config::{load_or_create_config, resolve_config_path};
use preflight_dashboard::console;
use preflight_dashboard::dashboard::Dashboard;
use preflight_dashboard::prefs::PreferenceStore;
use preflight_dashboard::transport::RosbridgeTransport;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 初始化日志记录器，RUST_LOG 可覆盖默认级别
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
    info!("[主程序] 日志系统已成功初始化 (env_logger)，默认级别: Info。");

    let config_path = resolve_config_path(std::env::args().nth(1));
    let config = load_or_create_config(&config_path);
    info!("[主程序] 应用配置已加载，rosbridge 地址: {}", config.rosbridge.url);

    let prefs = PreferenceStore::load(&config.ui.preferences_path);
    let (transport, events) = RosbridgeTransport::new();
    let (dashboard, handle) = Dashboard::new(config, Arc::new(transport), events, prefs);

    let console_task = tokio::spawn(console::run(handle.clone(), console::spawn_stdin_reader()));

    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("[主程序] 无法监听 Ctrl-C ({})，仅响应控制台退出。", e);
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            _ = ctrl_c => info!("[主程序] 收到 Ctrl-C，正在退出..."),
            _ = console_task => info!("[主程序] 控制台已结束，正在退出..."),
        }
        shutdown_handle.shutdown().await;
    });
    drop(handle);

    dashboard.run().await;
    info!("[主程序] 仪表盘已退出。");
    Ok(())
}

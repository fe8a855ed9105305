// preflight_dashboard/src/console.rs

//! 标准输入上的操作员控制台。每行一条命令：
//!
//! ```text
//! start | stop | scenario <name> | expand | collapse | toggle
//! call [service] | publish <text> | status | help | quit
//! ```

use crate::dashboard::DashboardHandle;
use common_models::enums::Scenario;
use log::{info, warn};
use std::io::BufRead;
use tokio::sync::mpsc::{self, UnboundedReceiver};

pub const HELP: &str = "commands: start | stop | scenario <idle|dive|surface|forward|circle|wobble> | \
expand | collapse | toggle | call [service] | publish <text> | status | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Scenario(Scenario),
    Expand,
    Collapse,
    Toggle,
    Call(Option<String>),
    Publish(String),
    Status,
    Help,
    Quit,
}

/// 解析一行输入。空行返回 `Ok(None)`。
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match word.to_ascii_lowercase().as_str() {
        "start" => ConsoleCommand::Start,
        "stop" => ConsoleCommand::Stop,
        "scenario" => {
            if rest.is_empty() {
                return Err("usage: scenario <name>".to_string());
            }
            ConsoleCommand::Scenario(rest.parse::<Scenario>().map_err(|e| e.to_string())?)
        }
        "expand" => ConsoleCommand::Expand,
        "collapse" => ConsoleCommand::Collapse,
        "toggle" => ConsoleCommand::Toggle,
        "call" => ConsoleCommand::Call((!rest.is_empty()).then(|| rest.to_string())),
        "publish" => {
            if rest.is_empty() {
                return Err("usage: publish <text>".to_string());
            }
            ConsoleCommand::Publish(rest.to_string())
        }
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{}'. {}", other, HELP)),
    };
    Ok(Some(command))
}

/// 执行一条命令并返回给操作员看的回复。
pub async fn execute(handle: &DashboardHandle, command: ConsoleCommand) -> String {
    match command {
        ConsoleCommand::Start => match handle.start_simulation().await {
            Ok(true) => "simulation started".to_string(),
            Ok(false) => "simulation already running".to_string(),
            Err(e) => format!("start declined: {}", e),
        },
        ConsoleCommand::Stop => match handle.stop_simulation().await {
            Ok(true) => "simulation stopped".to_string(),
            Ok(false) => "simulation is not running".to_string(),
            Err(e) => e.to_string(),
        },
        ConsoleCommand::Scenario(scenario) => match handle.select_scenario(scenario).await {
            Ok(()) => format!("scenario: {}", scenario.label()),
            Err(e) => format!("scenario change declined: {}", e),
        },
        ConsoleCommand::Expand => expanded_reply(handle.set_expanded(true).await),
        ConsoleCommand::Collapse => expanded_reply(handle.set_expanded(false).await),
        ConsoleCommand::Toggle => expanded_reply(handle.toggle_expanded().await),
        ConsoleCommand::Call(service) => match handle.call_trigger(service).await {
            Ok(response) => format!("success: {}, message: {}", response.success, response.message),
            Err(e) => format!("error: {}", e),
        },
        ConsoleCommand::Publish(text) => match handle.publish_text(text).await {
            Ok(()) => "published".to_string(),
            Err(e) => format!("publish declined: {}", e),
        },
        ConsoleCommand::Status => match handle.snapshot().await {
            Ok(snapshot) => snapshot.to_string(),
            Err(e) => e.to_string(),
        },
        ConsoleCommand::Help => HELP.to_string(),
        ConsoleCommand::Quit => "bye".to_string(),
    }
}

fn expanded_reply(result: Result<bool, crate::error::DashboardError>) -> String {
    match result {
        Ok(true) => "panel expanded".to_string(),
        Ok(false) => "panel collapsed".to_string(),
        Err(e) => e.to_string(),
    }
}

/// 在独立线程中阻塞读取标准输入，逐行转发。输入结束时通道关闭。
pub fn spawn_stdin_reader() -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("[控制台] 读取标准输入失败: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// 逐行执行命令，直到 `quit` 或输入结束。
pub async fn run(handle: DashboardHandle, mut lines: UnboundedReceiver<String>) {
    info!("[控制台] 操作员控制台已就绪。{}", HELP);
    while let Some(line) = lines.recv().await {
        match parse_command(&line) {
            Ok(Some(ConsoleCommand::Quit)) => return,
            Ok(Some(command)) => println!("{}", execute(&handle, command).await),
            Ok(None) => {}
            Err(message) => println!("{}", message),
        }
    }
    info!("[控制台] 标准输入已结束。");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("  start "), Ok(Some(ConsoleCommand::Start)));
        assert_eq!(parse_command("SCENARIO Circle"), Ok(Some(ConsoleCommand::Scenario(Scenario::Circle))));
        assert_eq!(parse_command("call"), Ok(Some(ConsoleCommand::Call(None))));
        assert_eq!(
            parse_command("call /arm_thrusters"),
            Ok(Some(ConsoleCommand::Call(Some("/arm_thrusters".to_string()))))
        );
        assert_eq!(
            parse_command("publish hello robot"),
            Ok(Some(ConsoleCommand::Publish("hello robot".to_string())))
        );
        assert_eq!(parse_command(""), Ok(None));
        assert_eq!(parse_command("exit"), Ok(Some(ConsoleCommand::Quit)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("scenario").is_err());
        assert!(parse_command("scenario barrel_roll").unwrap_err().contains("barrel_roll"));
        assert!(parse_command("publish").is_err());
        assert!(parse_command("fly").unwrap_err().contains("unknown command"));
    }
}

// preflight_dashboard/src/views.rs

//! 纯展示：把通道输出 (最新消息 + 频率) 与仿真面板状态渲染为文本行。

use crate::service::ServiceCallState;
use common_models::enums::Scenario;
use common_models::geometry_msgs::PoseWithCovarianceStamped;
use common_models::nav_msgs::Odometry;
use common_models::sensor_msgs::Imu;
use std::fmt;

/// 一路传感器数据的健康状况
#[derive(Debug, Clone, PartialEq)]
pub struct FeedHealth {
    /// 失活提示中使用的名称，例如 `imu`
    pub name: &'static str,
    /// 频率行中使用的名称，例如 `Imu`
    pub title: &'static str,
    pub rate: f64,
}

impl FeedHealth {
    pub fn new(name: &'static str, title: &'static str, rate: f64) -> Self {
        Self { name, title, rate }
    }

    pub fn is_dead(&self) -> bool {
        self.rate == 0.0
    }
}

/// 预检报告：失活的数据源、存活数据源的频率，以及最新的传感器读数。
#[derive(Debug, Clone, PartialEq)]
pub struct PreflightReport {
    pub imu: FeedHealth,
    pub dvl: FeedHealth,
    pub depth: FeedHealth,
    pub imu_msg: Option<Imu>,
    pub dvl_msg: Option<Odometry>,
    pub depth_msg: Option<PoseWithCovarianceStamped>,
}

fn reading(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.4}", v),
        None => "-".to_string(),
    }
}

impl PreflightReport {
    fn feeds(&self) -> [&FeedHealth; 3] {
        [&self.imu, &self.dvl, &self.depth]
    }

    /// 例如 `imu lost!`
    pub fn dead_feed_lines(&self) -> Vec<String> {
        self.feeds()
            .iter()
            .filter(|f| f.is_dead())
            .map(|f| format!("{} lost!", f.name))
            .collect()
    }

    /// 例如 `Imu Hz: 10.0`
    pub fn alive_feed_lines(&self) -> Vec<String> {
        self.feeds()
            .iter()
            .filter(|f| !f.is_dead())
            .map(|f| format!("{} Hz: {:.1}", f.title, f.rate))
            .collect()
    }

    pub fn reading_lines(&self) -> Vec<String> {
        let imu = self.imu_msg.as_ref();
        let dvl = self.dvl_msg.as_ref().map(|m| m.twist.twist.linear);
        let depth = self.depth_msg.as_ref().map(|m| m.pose.pose.position.z);
        vec![
            format!(
                "quat x: {}  y: {}  z: {}  w: {}",
                reading(imu.map(|m| m.orientation.x)),
                reading(imu.map(|m| m.orientation.y)),
                reading(imu.map(|m| m.orientation.z)),
                reading(imu.map(|m| m.orientation.w)),
            ),
            format!(
                "linear accel x: {}  y: {}  z: {}",
                reading(imu.map(|m| m.linear_acceleration.x)),
                reading(imu.map(|m| m.linear_acceleration.y)),
                reading(imu.map(|m| m.linear_acceleration.z)),
            ),
            format!(
                "angular twist x: {}  y: {}  z: {}",
                reading(imu.map(|m| m.angular_velocity.x)),
                reading(imu.map(|m| m.angular_velocity.y)),
                reading(imu.map(|m| m.angular_velocity.z)),
            ),
            format!(
                "linear velocity x: {}  y: {}  z: {}",
                reading(dvl.map(|v| v.x)),
                reading(dvl.map(|v| v.y)),
                reading(dvl.map(|v| v.z)),
            ),
            format!("depth: {}", reading(depth)),
        ]
    }
}

impl fmt::Display for PreflightReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.dead_feed_lines() {
            writeln!(f, "  [!] {}", line)?;
        }
        for line in self.alive_feed_lines() {
            writeln!(f, "  [ok] {}", line)?;
        }
        for line in self.reading_lines() {
            writeln!(f, "  {}", line)?;
        }
        Ok(())
    }
}

/// 仿真控制面板
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPanel {
    pub running: bool,
    pub scenario: Scenario,
    pub expanded: bool,
    pub last_call: ServiceCallState,
}

impl fmt::Display for SimulationPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.running { "Running" } else { "Stopped" };
        write!(f, "Simulation: {} | scenario: {}", status, self.scenario.label())?;
        if self.expanded {
            let options: Vec<&str> = Scenario::ALL.iter().map(|s| s.as_str()).collect();
            write!(f, " | available: {}", options.join(", "))?;
        } else {
            f.write_str(" | (collapsed)")?;
        }
        match &self.last_call {
            ServiceCallState::Idle => Ok(()),
            ServiceCallState::Loading { service } => write!(f, " | {}: calling...", service),
            ServiceCallState::Succeeded { service, response } => write!(
                f,
                " | {}: success={} message=\"{}\"",
                service, response.success, response.message
            ),
            ServiceCallState::Failed { service, error } => write!(f, " | {}: error: {}", service, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_models::geometry_msgs::Quaternion;
    use common_models::std_srvs::TriggerResponse;

    fn report(imu_rate: f64, dvl_rate: f64, depth_rate: f64) -> PreflightReport {
        PreflightReport {
            imu: FeedHealth::new("imu", "Imu", imu_rate),
            dvl: FeedHealth::new("dvl", "dvl", dvl_rate),
            depth: FeedHealth::new("depth", "Depth", depth_rate),
            imu_msg: None,
            dvl_msg: None,
            depth_msg: None,
        }
    }

    #[test]
    fn test_dead_and_alive_lines() {
        let r = report(10.0, 0.0, 0.0);
        assert_eq!(r.dead_feed_lines(), vec!["dvl lost!", "depth lost!"]);
        assert_eq!(r.alive_feed_lines(), vec!["Imu Hz: 10.0"]);
    }

    #[test]
    fn test_readings_without_messages_show_placeholders() {
        let lines = report(0.0, 0.0, 0.0).reading_lines();
        assert_eq!(lines.last().map(String::as_str), Some("depth: -"));
        assert!(lines[0].contains("quat x: -"));
    }

    #[test]
    fn test_readings_show_latest_imu() {
        let mut r = report(10.0, 10.0, 10.0);
        r.imu_msg = Some(Imu { orientation: Quaternion::IDENTITY, ..Imu::default() });
        let text = r.to_string();
        assert!(text.contains("w: 1.0000"));
        assert!(!text.contains("lost!"));
    }

    #[test]
    fn test_panel_line() {
        let mut panel = SimulationPanel {
            running: true,
            scenario: Scenario::Circle,
            expanded: false,
            last_call: ServiceCallState::Idle,
        };
        assert_eq!(panel.to_string(), "Simulation: Running | scenario: Circle Pattern | (collapsed)");

        panel.running = false;
        panel.expanded = true;
        panel.last_call = ServiceCallState::Succeeded {
            service: "/example_service".into(),
            response: TriggerResponse { success: true, message: "ok".into() },
        };
        let line = panel.to_string();
        assert!(line.starts_with("Simulation: Stopped"));
        assert!(line.contains("available: idle, dive, surface, forward, circle, wobble"));
        assert!(line.ends_with("/example_service: success=true message=\"ok\""));
    }
}

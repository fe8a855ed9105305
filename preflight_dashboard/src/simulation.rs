// preflight_dashboard/src/simulation.rs

//! 遥测仿真器：没有机器人接入时，以 10 Hz 的固定节拍生成 IMU、深度位姿与
//! DVL 里程计消息，经由三个发布句柄发到与真实传感器相同的话题上。
//!
//! 每个节拍 (Δt = 0.1 s)：推进仿真时间，按场景施加运动学，给每个发布的标量叠加
//! 有界的零均值均匀噪声，Z-Y-X 欧拉角转换为四元数，最后打上墙钟时间戳与固定坐标系发布。

use crate::channel::Publisher;
use crate::config::SimulationConfig;
use crate::transport::Transport;
use common_models::enums::Scenario;
use common_models::geometry_msgs::{
    Pose, PoseWithCovariance, PoseWithCovarianceStamped, Quaternion, Twist, TwistWithCovariance, Vector3,
};
use common_models::nav_msgs::Odometry;
use common_models::sensor_msgs::Imu;
use common_models::std_msgs::Header;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// 仿真步长（单位：秒）
pub const DT: f64 = 0.1;
/// 仿真节拍周期 (10 Hz)
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);
pub const GRAVITY: f64 = 9.81;

pub const IMU_TOPIC: &str = "/imu/data";
pub const DEPTH_TOPIC: &str = "/depth/pose";
pub const DVL_TOPIC: &str = "/dvl/odom";

pub const IMU_FRAME_ID: &str = "imu_link";
pub const DEPTH_FRAME_ID: &str = "depth_link";
pub const DVL_FRAME_ID: &str = "dvl_link";

/// 欧拉角（单位：弧度）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Euler {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// 一次仿真运行的状态，每个节拍更新一次，每次开始运行时重置。
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub sim_time: f64,
    pub scenario: Scenario,
    /// 深度，向下为正；与 `position.z` 互为相反数
    pub depth: f64,
    pub orientation: Euler,
    pub velocity: Vector3,
    pub position: Vector3,
}

impl SimulationState {
    pub fn new(scenario: Scenario, start_depth: f64) -> Self {
        Self {
            sim_time: 0.0,
            scenario,
            depth: start_depth,
            orientation: Euler::default(),
            velocity: Vector3::default(),
            position: Vector3::new(0.0, 0.0, -start_depth),
        }
    }
}

/// 各场景的运动学参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicsParams {
    pub circle_radius: f64,
    pub circle_angular_velocity: f64,
    pub dive_speed: f64,
    pub surface_speed: f64,
    pub forward_speed: f64,
    pub max_depth: f64,
}

impl From<&SimulationConfig> for KinematicsParams {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            circle_radius: config.circle_radius,
            circle_angular_velocity: config.circle_angular_velocity,
            dive_speed: config.dive_speed,
            surface_speed: config.surface_speed,
            forward_speed: config.forward_speed,
            max_depth: config.max_depth,
        }
    }
}

impl Default for KinematicsParams {
    fn default() -> Self {
        Self::from(&SimulationConfig::default())
    }
}

/// 按当前 `sim_time` 施加场景运动学。
pub fn apply_kinematics(state: &mut SimulationState, params: &KinematicsParams) {
    let t = state.sim_time;
    match state.scenario {
        Scenario::Idle => {
            state.velocity = Vector3::default();
        }
        Scenario::Dive => {
            state.velocity.z = -params.dive_speed;
            state.position.z += state.velocity.z * DT;
            if state.position.z < -params.max_depth {
                state.position.z = -params.max_depth;
                state.velocity.z = 0.0;
            }
            state.depth = -state.position.z;
        }
        Scenario::Surface => {
            state.velocity.z = params.surface_speed;
            state.position.z += state.velocity.z * DT;
            // 不能浮出水面
            if state.position.z >= 0.0 {
                state.position.z = 0.0;
                state.velocity.z = 0.0;
            }
            state.depth = -state.position.z;
        }
        Scenario::Forward => {
            state.velocity.x = params.forward_speed;
            state.position.x += state.velocity.x * DT;
        }
        Scenario::Circle => {
            let r = params.circle_radius;
            let omega = params.circle_angular_velocity;
            let theta = omega * t;
            state.position.x = r * theta.cos();
            state.position.y = r * theta.sin();
            state.velocity.x = -r * omega * theta.sin();
            state.velocity.y = r * omega * theta.cos();
            state.orientation.yaw = theta;
        }
        Scenario::Wobble => {
            state.orientation.roll = 0.1 * (2.0 * t).sin();
            state.orientation.pitch = 0.05 * (3.0 * t).cos();
        }
    }
}

/// Z-Y-X (yaw-pitch-roll) 欧拉角转四元数。
pub fn euler_to_quaternion(roll: f64, pitch: f64, yaw: f64) -> Quaternion {
    let (sr, cr) = (roll * 0.5).sin_cos();
    let (sp, cp) = (pitch * 0.5).sin_cos();
    let (sy, cy) = (yaw * 0.5).sin_cos();
    Quaternion {
        x: sr * cp * cy - cr * sp * sy,
        y: cr * sp * cy + sr * cp * sy,
        z: cr * cp * sy - sr * sp * cy,
        w: cr * cp * cy + sr * sp * sy,
    }
}

/// 零均值均匀噪声，取值范围 `[-amplitude/2, amplitude/2)`。
#[derive(Debug, Clone)]
pub struct NoiseSource {
    rng: StdRng,
    amplitude: f64,
}

impl NoiseSource {
    pub fn new(amplitude: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, amplitude }
    }

    pub fn sample(&mut self) -> f64 {
        (self.rng.gen::<f64>() - 0.5) * self.amplitude
    }
}

/// 一个节拍生成的三条消息
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    pub imu: Imu,
    pub depth: PoseWithCovarianceStamped,
    pub odom: Odometry,
}

/// 由当前状态与上一节拍的姿态合成三条传感器消息。
pub fn synthesize_frame(state: &SimulationState, previous: Euler, noise: &mut NoiseSource) -> TelemetryFrame {
    let o = state.orientation;
    let v = state.velocity;

    let orientation = euler_to_quaternion(o.roll + noise.sample(), o.pitch + noise.sample(), o.yaw + noise.sample());
    let imu = Imu {
        header: Header::stamped_now(IMU_FRAME_ID),
        orientation,
        linear_acceleration: Vector3::new(
            v.x * 0.1 + noise.sample(),
            v.y * 0.1 + noise.sample(),
            GRAVITY + v.z * 0.1 + noise.sample(),
        ),
        angular_velocity: Vector3::new(
            (o.roll - previous.roll) / DT + noise.sample(),
            (o.pitch - previous.pitch) / DT + noise.sample(),
            (o.yaw - previous.yaw) / DT + noise.sample(),
        ),
        ..Imu::default()
    };

    let depth = PoseWithCovarianceStamped {
        header: Header::stamped_now(DEPTH_FRAME_ID),
        pose: PoseWithCovariance {
            pose: Pose {
                position: Vector3::new(state.position.x, state.position.y, state.depth + noise.sample()),
                orientation: Quaternion::IDENTITY,
            },
            ..PoseWithCovariance::default()
        },
    };

    let odom = Odometry {
        header: Header::stamped_now(DVL_FRAME_ID),
        twist: TwistWithCovariance {
            twist: Twist {
                linear: Vector3::new(v.x + noise.sample(), v.y + noise.sample(), v.z + noise.sample()),
                angular: Vector3::default(),
            },
            ..TwistWithCovariance::default()
        },
        ..Odometry::default()
    };

    TelemetryFrame { imu, depth, odom }
}

/// 遥测仿真器，`Idle ⇄ Running` 两个状态。
pub struct TelemetrySimulator {
    params: KinematicsParams,
    start_depth: f64,
    noise: NoiseSource,
    state: Option<SimulationState>,
    next_tick: Option<Instant>,
    imu: Publisher<Imu>,
    depth: Publisher<PoseWithCovarianceStamped>,
    odom: Publisher<Odometry>,
    decline_streak: u32,
    ticks: u64,
}

impl TelemetrySimulator {
    pub fn new(config: &SimulationConfig, transport: Arc<dyn Transport>, connected: watch::Receiver<bool>) -> Self {
        Self {
            params: KinematicsParams::from(config),
            start_depth: config.start_depth,
            noise: NoiseSource::new(config.noise_amplitude, config.noise_seed),
            state: None,
            next_tick: None,
            imu: Publisher::new(IMU_TOPIC, transport.clone(), connected.clone()),
            depth: Publisher::new(DEPTH_TOPIC, transport.clone(), connected.clone()),
            odom: Publisher::new(DVL_TOPIC, transport, connected),
            decline_streak: 0,
            ticks: 0,
        }
    }

    /// 以 `scenario` 开始一次新的运行。已在运行时不做任何事并返回 `false`。
    pub fn start(&mut self, scenario: Scenario, now: Instant) -> bool {
        if self.is_running() {
            debug!("[遥测仿真] 仿真已在运行，忽略重复的启动请求。");
            return false;
        }
        self.state = Some(SimulationState::new(scenario, self.start_depth));
        self.next_tick = Some(now + TICK_INTERVAL);
        self.decline_streak = 0;
        self.ticks = 0;
        info!("[遥测仿真] 仿真已启动，场景: {}", scenario.label());
        true
    }

    /// 停止运行并立即取消节拍。空闲时调用是安全的，返回 `false`。
    pub fn stop(&mut self) -> bool {
        self.next_tick = None;
        match self.state.take() {
            Some(state) => {
                info!(
                    "[遥测仿真] 仿真已停止 (场景: {}, 共 {} 个节拍, 仿真时间 {:.1} s)",
                    state.scenario.label(),
                    self.ticks,
                    state.sim_time
                );
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&SimulationState> {
        self.state.as_ref()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_tick
    }

    /// 执行到期的节拍。落后超过一个周期时不补发，从当前时刻重新对齐。
    pub fn poll(&mut self, now: Instant) {
        let Some(deadline) = self.next_tick else {
            return;
        };
        if deadline > now {
            return;
        }
        self.step();
        let mut next = deadline + TICK_INTERVAL;
        if next <= now {
            next = now + TICK_INTERVAL;
        }
        self.next_tick = Some(next);
    }

    /// 推进一个节拍并发布三条消息。未运行时不做任何事。
    pub fn step(&mut self) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let previous = state.orientation;
        state.sim_time += DT;
        apply_kinematics(state, &self.params);
        let frame = synthesize_frame(state, previous, &mut self.noise);
        self.ticks += 1;

        let results = [
            self.imu.publish(&frame.imu),
            self.depth.publish(&frame.depth),
            self.odom.publish(&frame.odom),
        ];
        match results.iter().find_map(|r| r.as_ref().err()) {
            Some(e) => {
                self.decline_streak = self.decline_streak.saturating_add(1);
                if self.decline_streak == 1 {
                    warn!("[遥测仿真] 发布仿真数据失败: {}", e);
                } else {
                    debug!("[遥测仿真] 发布仍然失败 (连续 {} 次): {}", self.decline_streak, e);
                }
            }
            None => {
                if self.decline_streak > 0 {
                    info!("[遥测仿真] 发布已恢复 (此前连续失败 {} 次)。", self.decline_streak);
                }
                self.decline_streak = 0;
            }
        }
    }

    pub fn sync_connection(&mut self) {
        self.imu.sync_connection();
        self.depth.sync_connection();
        self.odom.sync_connection();
    }

    /// 撤销三个话题上的发布声明。
    pub fn release(&mut self) {
        self.imu.release();
        self.depth.release();
        self.odom.release();
    }
}

//! `sensor_msgs` 中的传感器消息。

use serde::{Deserialize, Serialize};

use crate::RosMessage;
use crate::geometry_msgs::{Quaternion, Vector3};
use crate::std_msgs::Header;

/// 惯性测量单元样本 (`/imu/data`)：姿态四元数、角速度与线加速度。
///
/// 3x3 协方差以长度为 9 的数组表示；全零表示"未知"。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Imu {
    pub header: Header,
    pub orientation: Quaternion,
    #[serde(default)]
    pub orientation_covariance: [f64; 9],
    pub angular_velocity: Vector3,
    #[serde(default)]
    pub angular_velocity_covariance: [f64; 9],
    pub linear_acceleration: Vector3,
    #[serde(default)]
    pub linear_acceleration_covariance: [f64; 9],
}

impl RosMessage for Imu {
    const TYPE_NAME: &'static str = "sensor_msgs/Imu";
}

//! `geometry_msgs` 中的几何消息。
//!
//! 协方差矩阵按 ROS 约定以行优先的扁平数组表示 (6x6 = 36 个元素)。
//! 由于入站消息可能省略协方差，相关字段都带有 `#[serde(default)]`。

use serde::{Deserialize, Serialize};

use crate::RosMessage;
use crate::std_msgs::Header;

/// 6x6 协方差矩阵的元素个数。
pub const COVARIANCE_6X6_LEN: usize = 36;

fn zero_covariance_6x6() -> Vec<f64> {
    vec![0.0; COVARIANCE_6X6_LEN]
}

/// 三维向量。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Vector3 { x, y, z }
    }
}

/// 三维空间中的点。
pub type Point = Vector3;

/// 单位四元数形式的姿态。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    /// 单位旋转。
    pub const IDENTITY: Quaternion = Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// 四元数的模长。
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion::IDENTITY
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PoseWithCovariance {
    pub pose: Pose,
    #[serde(default = "zero_covariance_6x6")]
    pub covariance: Vec<f64>,
}

impl Default for PoseWithCovariance {
    fn default() -> Self {
        PoseWithCovariance {
            pose: Pose::default(),
            covariance: zero_covariance_6x6(),
        }
    }
}

/// 带不确定度的位姿样本，深度计通过它发布深度 (`/depth/pose`)。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PoseWithCovarianceStamped {
    pub header: Header,
    pub pose: PoseWithCovariance,
}

impl RosMessage for PoseWithCovarianceStamped {
    const TYPE_NAME: &'static str = "geometry_msgs/PoseWithCovarianceStamped";
}

/// 线速度与角速度。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TwistWithCovariance {
    pub twist: Twist,
    #[serde(default = "zero_covariance_6x6")]
    pub covariance: Vec<f64>,
}

impl Default for TwistWithCovariance {
    fn default() -> Self {
        TwistWithCovariance {
            twist: Twist::default(),
            covariance: zero_covariance_6x6(),
        }
    }
}

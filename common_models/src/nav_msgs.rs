//! `nav_msgs` 中的导航消息。

use serde::{Deserialize, Serialize};

use crate::RosMessage;
use crate::geometry_msgs::{PoseWithCovariance, TwistWithCovariance};
use crate::std_msgs::Header;

/// 里程计样本。DVL 的速度测量通过 `twist.twist.linear` 发布到 `/dvl/odom`。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Odometry {
    pub header: Header,
    #[serde(default)]
    pub child_frame_id: String,
    #[serde(default)]
    pub pose: PoseWithCovariance,
    pub twist: TwistWithCovariance,
}

impl RosMessage for Odometry {
    const TYPE_NAME: &'static str = "nav_msgs/Odometry";
}

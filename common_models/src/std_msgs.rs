//! `std_msgs` 与 `builtin_interfaces` 中的基础消息。

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::RosMessage;

/// ROS 2 时间戳 (`builtin_interfaces/Time`)。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Time {
    /// 自 Unix 纪元以来的整秒数。
    pub sec: i32,
    /// 不足一秒的纳秒部分。
    pub nanosec: u32,
}

impl Time {
    /// 以当前墙上时钟 (UTC) 构造时间戳。
    pub fn now() -> Self {
        let now = Utc::now();
        Time {
            sec: now.timestamp() as i32,
            nanosec: now.timestamp_subsec_nanos(),
        }
    }
}

/// 带时间戳与坐标系标识的消息头。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

impl Header {
    /// 使用当前时间和给定坐标系构造消息头。
    pub fn stamped_now(frame_id: &str) -> Self {
        Header {
            stamp: Time::now(),
            frame_id: frame_id.to_string(),
        }
    }
}

/// `std_msgs/String`，操作员命令通过它发布。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct StringMsg {
    pub data: String,
}

impl RosMessage for StringMsg {
    const TYPE_NAME: &'static str = "std_msgs/String";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_now_is_after_2020_and_nanos_in_range() {
        let t = Time::now();
        assert!(t.sec > 1_577_836_800, "时间戳秒数应晚于 2020-01-01");
        assert!(t.nanosec < 1_000_000_000, "纳秒部分必须小于一秒");
    }

    #[test]
    fn header_json_uses_ros2_field_names() {
        let header = Header {
            stamp: Time { sec: 12, nanosec: 34 },
            frame_id: "imu_link".to_string(),
        };
        let json = serde_json::to_value(&header).expect("Header 序列化失败");
        assert_eq!(json["stamp"]["sec"], 12);
        assert_eq!(json["stamp"]["nanosec"], 34);
        assert_eq!(json["frame_id"], "imu_link");
    }
}

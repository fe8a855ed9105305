//! `std_srvs` 中的标准服务。

use serde::{Deserialize, Serialize};

use crate::RosService;

/// 触发式服务的请求，没有任何字段。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TriggerRequest {}

/// 触发式服务的响应。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
}

/// `std_srvs/Trigger`。
#[derive(Debug, Clone, Copy)]
pub struct Trigger;

impl RosService for Trigger {
    const TYPE_NAME: &'static str = "std_srvs/Trigger";
    type Request = TriggerRequest;
    type Response = TriggerResponse;
}

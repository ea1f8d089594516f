use super::links::JsonMap;
use axum::{
    response::{IntoResponse, Response as AxumResponse},
    Json as AxumJson,
};
use serde::Serialize;

/// The `{status, msg?, ...fields}` envelope every endpoint answers with.
#[derive(Debug, Serialize)]
pub struct Response {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(flatten)]
    pub data: JsonMap,
}

impl Response {
    pub fn new(message: &str, data: JsonMap) -> Self {
        Self {
            status: true,
            msg: Some(message.to_string()),
            data,
        }
    }
    pub fn from(data: JsonMap) -> Self {
        Self {
            status: true,
            msg: None,
            data,
        }
    }
    pub fn from_msg(msg: &str) -> Self {
        Self::new(msg, JsonMap::new())
    }
    pub fn fail(msg: &str) -> Self {
        Self {
            status: false,
            msg: Some(msg.to_string()),
            data: JsonMap::new(),
        }
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> AxumResponse {
        AxumJson(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fields_are_flattened_next_to_status() {
        let resp = Response::from(crate::json_map!("action" => "like", "like_count" => 1));
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"status": true, "action": "like", "like_count": 1})
        );
    }

    #[test]
    fn failure_carries_message_only() {
        let resp = Response::fail("选择最佳答案失败，请检查权限和积分");
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"status": false, "msg": "选择最佳答案失败，请检查权限和积分"})
        );
    }
}

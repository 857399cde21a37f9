use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub sessions: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_status_fields() {
        let body = serde_json::to_value(HealthResponse { status: "ok".into(), sessions: "error".into() }).unwrap();
        assert_eq!(body, serde_json::json!({ "status": "ok", "sessions": "error" }));
    }
}

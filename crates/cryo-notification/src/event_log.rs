//! tracing 기반 이벤트 로그.

use cryo_core::EventLog;
use serde_json::{Map, Value};
use tracing::{debug, error, info, trace, warn, Level};

/// 필드를 JSON 객체 문자열로 렌더링합니다.
fn render_fields(fields: &[(&str, String)]) -> String {
    let map: Map<String, Value> = fields
        .iter()
        .map(|(key, value)| (key.to_string(), Value::String(value.clone())))
        .collect();
    Value::Object(map).to_string()
}

/// `record` 호출을 `cryorithm::event` 대상의 tracing 이벤트로 내보내는 로그.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventLog;

impl TracingEventLog {
    pub fn new() -> Self {
        Self
    }
}

impl EventLog for TracingEventLog {
    fn record(&self, level: Level, message: &str, fields: &[(&str, String)]) {
        let fields = render_fields(fields);

        // tracing 매크로는 레벨이 상수여야 함
        if level == Level::ERROR {
            error!(target: "cryorithm::event", fields = %fields, "{}", message);
        } else if level == Level::WARN {
            warn!(target: "cryorithm::event", fields = %fields, "{}", message);
        } else if level == Level::INFO {
            info!(target: "cryorithm::event", fields = %fields, "{}", message);
        } else if level == Level::DEBUG {
            debug!(target: "cryorithm::event", fields = %fields, "{}", message);
        } else {
            trace!(target: "cryorithm::event", fields = %fields, "{}", message);
        }
    }
}

//! 센서 페이로드와 정규화된 JSON 직렬화.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;

/// 센서가 반환하는 JSON 페이로드. 파이프라인은 내용을 해석하지 않습니다.
pub type SignalPayload = Value;

/// 페이로드가 비어 있는지 확인합니다 (`null`, `{}`, `[]`, `""`).
pub fn is_empty_payload(payload: &SignalPayload) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// 키를 정렬한 간결한 JSON 문자열로 직렬화합니다.
///
/// `serde_json`의 `preserve_order` 기능 활성화 여부와 무관하게 동일한 입력은
/// 항상 동일한 문자열이 됩니다.
pub fn canonical_json(payload: &SignalPayload) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Canonical(payload))
}

struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));

                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &Canonical(value))?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&Canonical(item))?;
                }
                out.end()
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

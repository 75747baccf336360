//! 설정 레이어.
//!
//! 레이어는 고정된 우선순위(rank)를 가진 키/값 매핑입니다.
//! `defaults`(0) < `file`(1) < `environment`(2) < `cli`(3) 순으로 높은 rank가 이깁니다.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use config::{Source, Value, ValueKind};
use serde::Serialize;

use crate::config::keys;
use crate::error::ConfigError;

/// 설정 값 (문자열 | 숫자 | null).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SettingValue {
    /// null 여부.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 문자열 값이면 참조를 반환합니다.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// 레이어 종류. 선언 순서가 곧 우선순위입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// 시스템/호출자 기본값
    Defaults,
    /// YAML 설정 파일
    File,
    /// 환경 변수
    Environment,
    /// 명시적으로 전달된 CLI 플래그
    Cli,
}

impl LayerKind {
    /// 우선순위 (높을수록 우선).
    pub fn rank(&self) -> u8 {
        match self {
            Self::Defaults => 0,
            Self::File => 1,
            Self::Environment => 2,
            Self::Cli => 3,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::File => write!(f, "file"),
            Self::Environment => write!(f, "environment"),
            Self::Cli => write!(f, "cli"),
        }
    }
}

/// 환경 변수 출처.
///
/// 테스트에서는 `Fixed`로 프로세스 환경과 무관한 값을 주입합니다.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// 실제 프로세스 환경 변수
    #[default]
    Process,
    /// 고정된 변수 목록
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    /// 변수 하나를 조회합니다.
    pub fn var(&self, name: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(name).ok(),
            Self::Fixed(vars) => vars.get(name).cloned(),
        }
    }

    /// `config::Environment::source`에 넘길 변수 목록 (`None`이면 프로세스 환경).
    fn snapshot(&self) -> Option<config::Map<String, String>> {
        match self {
            Self::Process => None,
            Self::Fixed(vars) => Some(vars.clone().into_iter().collect()),
        }
    }

    fn collect(
        &self,
        environment: config::Environment,
    ) -> Result<config::Map<String, Value>, ConfigError> {
        environment
            .ignore_empty(true)
            .source(self.snapshot())
            .collect()
            .map_err(ConfigError::Environment)
    }
}

impl From<HashMap<String, String>> for EnvSource {
    fn from(vars: HashMap<String, String>) -> Self {
        Self::Fixed(vars)
    }
}

/// 이름(종류)이 붙은 설정 레이어.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayer {
    kind: LayerKind,
    entries: BTreeMap<String, SettingValue>,
}

impl ConfigLayer {
    /// 빈 레이어를 생성합니다.
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// 키를 설정한 레이어를 반환합니다 (같은 키는 마지막 값이 이김).
    pub fn with(mut self, key: &str, value: impl Into<SettingValue>) -> Self {
        self.set(key, value);
        self
    }

    /// 키를 설정합니다. 키는 소문자로 정규화됩니다.
    pub fn set(&mut self, key: &str, value: impl Into<SettingValue>) {
        self.entries.insert(key.to_lowercase(), value.into());
    }

    /// 값이 있을 때만 설정합니다.
    ///
    /// 전달되지 않은 CLI 플래그(`None`)는 레이어에 들어가지 않으므로
    /// 하위 레이어의 값을 덮어쓸 수 없습니다.
    pub fn set_if_present<V: Into<SettingValue>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    /// 레이어 종류.
    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    /// 키 조회.
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.entries.get(&key.to_lowercase())
    }

    /// 키가 정의되어 있는지 확인합니다 (null 포함).
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 키 순서대로 항목을 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 문서화된 시스템 기본값.
    ///
    /// - `destination`: `log`
    /// - `llm_model`: `gpt-4-turbo`
    pub fn system_defaults() -> Self {
        Self::new(LayerKind::Defaults)
            .with(keys::DESTINATION, "log")
            .with(keys::LLM_MODEL, "gpt-4-turbo")
    }

    /// YAML 설정 파일에서 레이어를 읽습니다.
    ///
    /// 파일이 없으면 빈 레이어를 반환합니다. 중첩된 매핑은 `_`로 평탄화되고
    /// (`broker: {topic: x}` → `broker_topic`), 스칼라 배열은 쉼표로 연결됩니다.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let mut layer = Self::new(LayerKind::File);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "설정 파일 없음, 빈 레이어 사용");
            return Ok(layer);
        }

        let parse_error = |source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        };

        let document = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .build()
            .map_err(parse_error)?;
        let table = document.collect().map_err(parse_error)?;

        for (key, value) in table {
            flatten_into(&mut layer, &key, value).map_err(|reason| ConfigError::Parse {
                path: path.to_path_buf(),
                source: config::ConfigError::Message(reason),
            })?;
        }

        tracing::debug!(path = %path.display(), keys = layer.len(), "설정 파일 로드 완료");
        Ok(layer)
    }

    /// 인식 가능한 환경 변수에서 레이어를 읽습니다.
    ///
    /// `{PREFIX}_{KEY}` 형식이며 빈 값과 `keys::ENV_KEYS`에 없는 키는 무시됩니다.
    /// LLM API 키는 생태계 관례에 따라 접두사 없는 `OPENAI_API_KEY`에서 읽습니다.
    pub fn from_env(prefix: &str, env: &EnvSource) -> Result<Self, ConfigError> {
        let mut layer = Self::new(LayerKind::Environment);

        let prefix = prefix.trim_end_matches('_');
        let environment = if prefix.is_empty() {
            config::Environment::default()
        } else {
            config::Environment::with_prefix(prefix).prefix_separator("_")
        };
        for (key, value) in env.collect(environment)? {
            if keys::ENV_KEYS.contains(&key.as_str()) {
                layer.set_if_present(&key, non_blank(value));
            }
        }

        // 접두사 없는 자격 증명
        let credential = keys::LLM_API_KEY_ENV.to_lowercase();
        if let Some(value) = env.collect(config::Environment::default())?.remove(&credential) {
            layer.set_if_present(keys::LLM_API_KEY, non_blank(value));
        }

        tracing::debug!(keys = layer.len(), "환경 변수 레이어 로드 완료");
        Ok(layer)
    }
}

/// 공백뿐인 값은 정의되지 않은 것으로 취급합니다.
fn non_blank(value: Value) -> Option<String> {
    value.into_string().ok().filter(|v| !v.trim().is_empty())
}

fn flatten_into(layer: &mut ConfigLayer, key: &str, value: Value) -> Result<(), String> {
    match value.kind {
        ValueKind::Table(table) => {
            for (child, child_value) in table {
                flatten_into(layer, &format!("{}_{}", key, child), child_value)?;
            }
        }
        ValueKind::Array(items) => {
            let joined = items
                .into_iter()
                .map(|item| scalar(key, item.kind).map(|v| v.to_string()))
                .collect::<Result<Vec<_>, _>>()?
                .join(",");
            layer.set(key, joined);
        }
        other => {
            layer.set(key, scalar(key, other)?);
        }
    }
    Ok(())
}

fn scalar(key: &str, kind: ValueKind) -> Result<SettingValue, String> {
    match kind {
        ValueKind::Nil => Ok(SettingValue::Null),
        ValueKind::Boolean(b) => Ok(SettingValue::Text(b.to_string())),
        ValueKind::I64(n) => Ok(SettingValue::Integer(n)),
        ValueKind::U64(n) => i64::try_from(n)
            .map(SettingValue::Integer)
            .map_err(|_| format!("{}: 정수 범위 초과", key)),
        ValueKind::I128(n) => i64::try_from(n)
            .map(SettingValue::Integer)
            .map_err(|_| format!("{}: 정수 범위 초과", key)),
        ValueKind::U128(n) => i64::try_from(n)
            .map(SettingValue::Integer)
            .map_err(|_| format!("{}: 정수 범위 초과", key)),
        ValueKind::Float(n) => Ok(SettingValue::Float(n)),
        ValueKind::String(s) => Ok(SettingValue::Text(s)),
        ValueKind::Table(_) | ValueKind::Array(_) => {
            Err(format!("{}: 배열 안에 중첩된 구조는 지원하지 않습니다", key))
        }
    }
}

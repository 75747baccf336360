//! 해석이 끝난 불변 설정 스냅샷.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::config::keys;
use crate::config::layer::{LayerKind, SettingValue};
use crate::error::{ConfigError, Violation};

/// 수집한 데이터를 보낼 대상 (싱크).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// 구조화 로그로 출력
    Log,
    /// 메시지 브로커로 발행
    Broker,
    /// LLM 요약
    Llm,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Broker => write!(f, "broker"),
            Self::Llm => write!(f, "llm"),
        }
    }
}

impl FromStr for Destination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "broker" | "kafka" => Ok(Self::Broker),
            "llm" | "openai" => Ok(Self::Llm),
            other => Err(format!(
                "알 수 없는 destination '{}' (log, broker, llm 중 하나)",
                other
            )),
        }
    }
}

/// 브로커 발행 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    /// 부트스트랩 서버 목록 (host:port 또는 URL)
    pub bootstrap_servers: Vec<String>,
    /// 발행할 토픽
    pub topic: String,
}

/// LLM 요약 설정.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// API 키 (Debug 출력 시 가려짐)
    pub api_key: SecretString,
    /// 모델 이름
    pub model: String,
    /// 최대 생성 토큰 수
    pub max_tokens: Option<u32>,
    /// 샘플링 온도 (0.0 ~ 2.0)
    pub temperature: Option<f64>,
    /// API 주소 (없으면 공식 주소)
    pub base_url: Option<String>,
}

/// 병합 결과: 키별 값과 그 값을 제공한 레이어.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedSettings {
    values: BTreeMap<String, (SettingValue, LayerKind)>,
}

impl MergedSettings {
    pub(crate) fn insert(&mut self, key: &str, value: SettingValue, source: LayerKind) {
        self.values.insert(key.to_string(), (value, source));
    }

    /// 키의 최종 값.
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key).map(|(value, _)| value)
    }

    /// 키의 최종 값을 제공한 레이어.
    pub fn source_of(&self, key: &str) -> Option<LayerKind> {
        self.values.get(key).map(|(_, source)| *source)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 모든 레이어를 병합하고 검증한 불변 설정.
///
/// 프로세스 실행당 한 번 생성되며 이후 읽기 전용입니다. 여러 파이프라인 실행이
/// 값으로 공유해도 안전합니다.
#[derive(Debug, Clone)]
pub struct Configuration {
    ticker: String,
    destination: Destination,
    broker: Option<BrokerSettings>,
    llm: Option<LlmSettings>,
    sensor_timeout: Option<Duration>,
    values: BTreeMap<String, SettingValue>,
    sources: BTreeMap<String, LayerKind>,
}

impl Configuration {
    /// 병합 결과를 검증하여 설정을 만듭니다.
    ///
    /// 첫 번째 위반에서 멈추지 않고 모든 위반을 모아 하나의 에러로 반환합니다.
    pub fn from_merged(merged: MergedSettings) -> Result<Self, ConfigError> {
        let mut violations = Vec::new();

        let ticker = required_text(&merged, keys::TICKER, &mut violations);
        let destination = required_text(&merged, keys::DESTINATION, &mut violations)
            .and_then(|raw| match raw.parse::<Destination>() {
                Ok(destination) => Some(destination),
                Err(reason) => {
                    violations.push(Violation::invalid(keys::DESTINATION, reason));
                    None
                }
            });

        let broker = match destination {
            Some(Destination::Broker) => {
                let servers =
                    required_text(&merged, keys::BROKER_BOOTSTRAP_SERVERS, &mut violations)
                        .and_then(|raw| {
                            let servers = split_servers(&raw);
                            if servers.is_empty() {
                                violations.push(Violation::invalid(
                                    keys::BROKER_BOOTSTRAP_SERVERS,
                                    "서버 목록이 비어 있습니다",
                                ));
                                None
                            } else {
                                Some(servers)
                            }
                        });
                let topic = required_text(&merged, keys::BROKER_TOPIC, &mut violations);
                match (servers, topic) {
                    (Some(bootstrap_servers), Some(topic)) => Some(BrokerSettings {
                        bootstrap_servers,
                        topic,
                    }),
                    _ => None,
                }
            }
            _ => None,
        };

        let llm = match destination {
            Some(Destination::Llm) => {
                let api_key = required_text(&merged, keys::LLM_API_KEY, &mut violations);
                let model = required_text(&merged, keys::LLM_MODEL, &mut violations);
                let max_tokens = optional_integer(&merged, keys::LLM_MAX_TOKENS, &mut violations)
                    .and_then(|n| match u32::try_from(n) {
                        Ok(n) if n > 0 => Some(n),
                        _ => {
                            violations.push(Violation::invalid(
                                keys::LLM_MAX_TOKENS,
                                format!("1 이상의 정수여야 합니다 (현재 값: {})", n),
                            ));
                            None
                        }
                    });
                let temperature = optional_float(&merged, keys::LLM_TEMPERATURE, &mut violations)
                    .and_then(|t| {
                        if (0.0..=2.0).contains(&t) {
                            Some(t)
                        } else {
                            violations.push(Violation::invalid(
                                keys::LLM_TEMPERATURE,
                                format!("0.0 ~ 2.0 범위여야 합니다 (현재 값: {})", t),
                            ));
                            None
                        }
                    });
                let base_url = optional_text(&merged, keys::LLM_BASE_URL);
                match (api_key, model) {
                    (Some(api_key), Some(model)) => Some(LlmSettings {
                        api_key: SecretString::new(api_key.into()),
                        model,
                        max_tokens,
                        temperature,
                        base_url,
                    }),
                    _ => None,
                }
            }
            _ => None,
        };

        let sensor_timeout = optional_integer(&merged, keys::SENSOR_TIMEOUT_SECS, &mut violations)
            .and_then(|secs| match u64::try_from(secs) {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    violations.push(Violation::invalid(
                        keys::SENSOR_TIMEOUT_SECS,
                        format!("1 이상의 정수여야 합니다 (현재 값: {})", secs),
                    ));
                    None
                }
            });

        if !violations.is_empty() {
            return Err(ConfigError::Validation { violations });
        }

        // 위반이 없으면 필수 값은 모두 존재
        let (Some(ticker), Some(destination)) = (ticker, destination) else {
            return Err(ConfigError::Validation {
                violations: vec![Violation::missing(keys::TICKER)],
            });
        };

        let mut values = BTreeMap::new();
        let mut sources = BTreeMap::new();
        for (key, (value, source)) in merged.values {
            let value = if keys::SECRET_KEYS.contains(&key.as_str()) {
                SettingValue::Text("[REDACTED]".to_string())
            } else {
                value
            };
            values.insert(key.clone(), value);
            sources.insert(key, source);
        }

        Ok(Self {
            ticker,
            destination,
            broker,
            llm,
            sensor_timeout,
            values,
            sources,
        })
    }

    /// 종목 티커.
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// 전달 대상.
    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// 브로커 설정 (destination이 broker일 때만 존재).
    pub fn broker(&self) -> Option<&BrokerSettings> {
        self.broker.as_ref()
    }

    /// LLM 설정 (destination이 llm일 때만 존재).
    pub fn llm(&self) -> Option<&LlmSettings> {
        self.llm.as_ref()
    }

    /// 센서 요청 타임아웃 (설정되지 않으면 센서 기본값 사용).
    pub fn sensor_timeout(&self) -> Option<Duration> {
        self.sensor_timeout
    }

    /// 병합된 임의 키의 값. 비밀 값은 가려져 있습니다.
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(&key.to_lowercase())
    }

    /// 키의 값을 제공한 레이어.
    pub fn source_of(&self, key: &str) -> Option<LayerKind> {
        self.sources.get(&key.to_lowercase()).copied()
    }

    /// 병합된 (키, 값, 출처) 목록.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SettingValue, LayerKind)> {
        self.values.iter().filter_map(|(key, value)| {
            self.sources
                .get(key)
                .map(|source| (key.as_str(), value, *source))
        })
    }
}

/// 쉼표로 구분된 서버 목록을 나눕니다.
fn split_servers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn required_text(
    merged: &MergedSettings,
    key: &str,
    violations: &mut Vec<Violation>,
) -> Option<String> {
    match merged.get(key) {
        None | Some(SettingValue::Null) => {
            violations.push(Violation::missing(key));
            None
        }
        Some(SettingValue::Text(text)) if text.trim().is_empty() => {
            violations.push(Violation::invalid(key, "빈 문자열"));
            None
        }
        Some(SettingValue::Text(text)) => Some(text.trim().to_string()),
        Some(number @ (SettingValue::Integer(_) | SettingValue::Float(_))) => {
            // YAML은 `005930`을 정수 5930으로 읽음
            violations.push(Violation::invalid(
                key,
                format!(
                    "문자열이어야 합니다 (현재 값: {}). 숫자 값은 YAML에서 따옴표로 감싸세요 (예: {}: \"005930\")",
                    number, key
                ),
            ));
            None
        }
    }
}

fn optional_integer(
    merged: &MergedSettings,
    key: &str,
    violations: &mut Vec<Violation>,
) -> Option<i64> {
    match merged.get(key) {
        None | Some(SettingValue::Null) => None,
        Some(SettingValue::Integer(n)) => Some(*n),
        Some(SettingValue::Text(text)) => match text.trim().parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                violations.push(Violation::invalid(
                    key,
                    format!("정수여야 합니다 (현재 값: {})", text),
                ));
                None
            }
        },
        Some(other) => {
            violations.push(Violation::invalid(
                key,
                format!("정수여야 합니다 (현재 값: {})", other),
            ));
            None
        }
    }
}

fn optional_float(
    merged: &MergedSettings,
    key: &str,
    violations: &mut Vec<Violation>,
) -> Option<f64> {
    match merged.get(key) {
        None | Some(SettingValue::Null) => None,
        Some(SettingValue::Integer(n)) => Some(*n as f64),
        Some(SettingValue::Float(n)) => Some(*n),
        Some(SettingValue::Text(text)) => match text.trim().parse::<f64>() {
            Ok(n) => Some(n),
            Err(_) => {
                violations.push(Violation::invalid(
                    key,
                    format!("숫자여야 합니다 (현재 값: {})", text),
                ));
                None
            }
        },
    }
}

fn optional_text(merged: &MergedSettings, key: &str) -> Option<String> {
    merged
        .get(key)
        .and_then(SettingValue::as_text)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn merged(pairs: &[(&str, SettingValue)]) -> MergedSettings {
        let mut merged = MergedSettings::default();
        for (key, value) in pairs {
            merged.insert(key, value.clone(), LayerKind::Cli);
        }
        merged
    }

    #[test]
    fn test_destination_aliases() {
        assert_eq!("LOG".parse::<Destination>(), Ok(Destination::Log));
        assert_eq!("kafka".parse::<Destination>(), Ok(Destination::Broker));
        assert_eq!("openai".parse::<Destination>(), Ok(Destination::Llm));
        assert!("email".parse::<Destination>().is_err());
    }

    #[test]
    fn test_split_servers_trims_and_drops_empty() {
        assert_eq!(
            split_servers(" a:9092, ,b:9092 ,"),
            vec!["a:9092".to_string(), "b:9092".to_string()]
        );
    }

    #[test]
    fn test_broker_settings_parsed() {
        let config = Configuration::from_merged(merged(&[
            ("ticker", "F".into()),
            ("destination", "broker".into()),
            ("broker_bootstrap_servers", "k1:8082,k2:8082".into()),
            ("broker_topic", "fundamentals".into()),
        ]))
        .unwrap();

        let broker = config.broker().unwrap();
        assert_eq!(broker.bootstrap_servers, vec!["k1:8082", "k2:8082"]);
        assert_eq!(broker.topic, "fundamentals");
        assert!(config.llm().is_none());
    }

    #[test]
    fn test_llm_key_redacted_in_snapshot() {
        let config = Configuration::from_merged(merged(&[
            ("ticker", "F".into()),
            ("destination", "llm".into()),
            ("llm_api_key", "sk-secret".into()),
            ("llm_model", "gpt-4-turbo".into()),
        ]))
        .unwrap();

        assert_eq!(config.llm().unwrap().api_key.expose_secret(), "sk-secret");
        assert_eq!(
            config.get("llm_api_key"),
            Some(&SettingValue::from("[REDACTED]"))
        );
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }

    #[test]
    fn test_null_and_wrong_type_reported_together() {
        let err = Configuration::from_merged(merged(&[
            ("ticker", SettingValue::Integer(5930)),
            ("destination", SettingValue::Null),
        ]))
        .unwrap_err();

        assert_eq!(err.missing_keys(), vec!["destination"]);
        assert_eq!(err.violations().len(), 2);
        assert_eq!(err.violations()[0].key, "ticker");
    }

    #[test]
    fn test_numeric_ticker_suggests_quoting() {
        let err = Configuration::from_merged(merged(&[
            ("ticker", SettingValue::Integer(5930)),
            ("destination", "log".into()),
        ]))
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("5930"));
        assert!(message.contains("따옴표"));
        assert!(message.contains("ticker: \"005930\""));

        let err = Configuration::from_merged(merged(&[
            ("ticker", "F".into()),
            ("destination", SettingValue::Float(1.5)),
        ]))
        .unwrap_err();
        assert_eq!(err.violations()[0].key, "destination");
        assert!(err.to_string().contains("따옴표"));
    }

    #[test]
    fn test_llm_optional_settings() {
        let config = Configuration::from_merged(merged(&[
            ("ticker", "F".into()),
            ("destination", "llm".into()),
            ("llm_api_key", "sk-secret".into()),
            ("llm_model", "gpt-4-turbo".into()),
            ("llm_max_tokens", SettingValue::Integer(512)),
            ("llm_temperature", "0.7".into()),
            ("sensor_timeout_secs", "15".into()),
        ]))
        .unwrap();

        let llm = config.llm().unwrap();
        assert_eq!(llm.max_tokens, Some(512));
        assert_eq!(llm.temperature, Some(0.7));
        assert!(llm.base_url.is_none());
        assert_eq!(config.sensor_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_invalid_optional_settings_reported() {
        let err = Configuration::from_merged(merged(&[
            ("ticker", "F".into()),
            ("destination", "llm".into()),
            ("llm_api_key", "sk-secret".into()),
            ("llm_model", "gpt-4-turbo".into()),
            ("llm_max_tokens", SettingValue::Integer(0)),
            ("llm_temperature", SettingValue::Float(3.5)),
            ("sensor_timeout_secs", "soon".into()),
        ]))
        .unwrap_err();

        let keys: Vec<_> = err.violations().iter().map(|v| v.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["llm_max_tokens", "llm_temperature", "sensor_timeout_secs"]
        );
        assert!(err.missing_keys().is_empty());
    }

    #[test]
    fn test_unknown_destination_rejected() {
        let err = Configuration::from_merged(merged(&[
            ("ticker", "F".into()),
            ("destination", "email".into()),
        ]))
        .unwrap_err();

        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].key, "destination");
        assert!(err.missing_keys().is_empty());
    }
}

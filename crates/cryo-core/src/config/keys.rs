//! 설정 키 상수.

pub const TICKER: &str = "ticker";
pub const DESTINATION: &str = "destination";
pub const BROKER_BOOTSTRAP_SERVERS: &str = "broker_bootstrap_servers";
pub const BROKER_TOPIC: &str = "broker_topic";
pub const LLM_API_KEY: &str = "llm_api_key";
pub const LLM_MODEL: &str = "llm_model";

// 선택 키 (파일 또는 환경 변수)
pub const LLM_MAX_TOKENS: &str = "llm_max_tokens";
pub const LLM_TEMPERATURE: &str = "llm_temperature";
pub const LLM_BASE_URL: &str = "llm_base_url";
pub const SENSOR_TIMEOUT_SECS: &str = "sensor_timeout_secs";

/// LLM API 키를 읽는 환경 변수 (접두사 없음).
pub const LLM_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// `{PREFIX}_{KEY}` 형식으로 환경 변수에서 읽는 키.
pub const ENV_KEYS: &[&str] = &[
    TICKER,
    DESTINATION,
    BROKER_BOOTSTRAP_SERVERS,
    BROKER_TOPIC,
    LLM_MODEL,
    LLM_MAX_TOKENS,
    LLM_TEMPERATURE,
    LLM_BASE_URL,
    SENSOR_TIMEOUT_SECS,
];

/// 스냅샷과 로그에서 값이 가려지는 키.
pub const SECRET_KEYS: &[&str] = &[LLM_API_KEY];

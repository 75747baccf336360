//! 설정 관리.
//!
//! 네 개의 레이어(기본값, 파일, 환경 변수, CLI)를 고정된 우선순위로 병합하여
//! 한 번의 실행 동안 변하지 않는 `Configuration`을 만듭니다.

pub mod keys;
mod layer;
mod resolver;
mod settings;

pub use layer::{ConfigLayer, EnvSource, LayerKind, SettingValue};
pub use resolver::{
    default_config_path, expand_tilde, merge_layers, ConfigResolver, CONFIG_PATH_ENV,
    DEFAULT_ENV_PREFIX,
};
pub use settings::{BrokerSettings, Configuration, Destination, LlmSettings, MergedSettings};

//! 레이어 설정 해석기.
//!
//! 기본값 → YAML 파일 → 환경 변수 → CLI 플래그 순으로 병합합니다.
//! 레이어 간 우선순위는 전달 순서와 무관하게 rank로만 결정됩니다.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::layer::{ConfigLayer, EnvSource};
use crate::config::settings::{Configuration, MergedSettings};
use crate::error::ConfigError;

/// 기본 환경 변수 접두사.
pub const DEFAULT_ENV_PREFIX: &str = "CRYORITHM";

/// 설정 파일 경로를 지정하는 환경 변수.
pub const CONFIG_PATH_ENV: &str = "CRYORITHM_CONFIG";

/// 레이어들을 rank 순으로 병합합니다.
///
/// 같은 rank 안에서는 나중에 전달된 레이어가 이기고, 낮은 rank의 레이어는
/// 늦게 전달되더라도 높은 rank의 값을 덮어쓰지 못합니다.
pub fn merge_layers(mut layers: Vec<ConfigLayer>) -> MergedSettings {
    layers.sort_by_key(|layer| layer.kind().rank());

    let mut merged = MergedSettings::default();
    for layer in &layers {
        for (key, value) in layer.iter() {
            merged.insert(key, value.clone(), layer.kind());
        }
    }
    merged
}

/// 기본 설정 파일 경로 (`~/.config/cryorithm/config.yaml`).
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".config")
        .join("cryorithm")
        .join("config.yaml")
}

/// 선행 `~/`를 홈 디렉토리로 확장합니다.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// 네 개의 레이어를 병합해 검증된 `Configuration`을 만드는 해석기.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    env: EnvSource,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// 프로세스 환경 변수를 읽는 해석기를 생성합니다.
    pub fn new() -> Self {
        Self {
            env: EnvSource::Process,
        }
    }

    /// 주어진 환경 변수 소스를 사용하는 해석기를 생성합니다.
    pub fn with_env(env: impl Into<EnvSource>) -> Self {
        Self { env: env.into() }
    }

    /// 설정을 해석합니다.
    ///
    /// # 인자
    /// - `defaults`: 가장 낮은 우선순위의 기본값 레이어
    /// - `file_path`: YAML 설정 파일 (없으면 빈 레이어)
    /// - `env_prefix`: 환경 변수 접두사 (예: `CRYORITHM`)
    /// - `cli_overrides`: 명시적으로 전달된 CLI 플래그만 담은 레이어
    ///
    /// # 에러
    /// - 설정 파일 파싱 실패 시 `ConfigError::Parse`
    /// - 환경 변수 읽기 실패 시 `ConfigError::Environment`
    /// - 필수 키 누락/잘못된 값이 있으면 모든 위반을 담은 `ConfigError::Validation`
    pub fn resolve(
        &self,
        defaults: ConfigLayer,
        file_path: Option<&Path>,
        env_prefix: &str,
        cli_overrides: ConfigLayer,
    ) -> Result<Configuration, ConfigError> {
        let file = match file_path {
            Some(path) => ConfigLayer::from_yaml_file(path)?,
            None => ConfigLayer::new(crate::config::LayerKind::File),
        };
        let env = ConfigLayer::from_env(env_prefix, &self.env)?;

        debug!(
            defaults = defaults.len(),
            file = file.len(),
            environment = env.len(),
            cli = cli_overrides.len(),
            "설정 레이어 병합"
        );

        let merged = merge_layers(vec![defaults, file, env, cli_overrides]);
        Configuration::from_merged(merged)
    }
}

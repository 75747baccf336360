//! 명령줄 인자와 CLI 설정 레이어.

use std::path::{Path, PathBuf};

use clap::Parser;
use cryo_core::config::{
    default_config_path, expand_tilde, keys, ConfigLayer, EnvSource, LayerKind, CONFIG_PATH_ENV,
};
use cryo_core::LogFormat;

/// Cryorithm 센서 CLI.
///
/// 설정 값 플래그에는 기본값이 없습니다. 전달하지 않은 플래그는 CLI 레이어에
/// 들어가지 않으므로 파일이나 환경 변수의 값을 덮어쓰지 않습니다.
#[derive(Debug, Parser)]
#[command(name = "cryorithm")]
#[command(about = "Cryorithm 센서 - 주식 펀더멘털 수집 후 로그/브로커/LLM으로 전달", long_about = None)]
#[command(version)]
pub struct Cli {
    /// 설정 파일 경로 (기본: $CRYORITHM_CONFIG 또는 ~/.config/cryorithm/config.yaml)
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// 종목 티커 (예: F, AAPL, 005930.KS)
    #[arg(long)]
    pub ticker: Option<String>,

    /// 전달 대상
    #[arg(long, value_parser = ["log", "broker", "llm", "kafka", "openai"], ignore_case = true)]
    pub destination: Option<String>,

    /// 브로커 부트스트랩 서버 (쉼표로 구분)
    #[arg(long)]
    pub broker_bootstrap_servers: Option<String>,

    /// 브로커 토픽
    #[arg(long)]
    pub broker_topic: Option<String>,

    /// LLM 모델 이름
    #[arg(long)]
    pub llm_model: Option<String>,

    /// 로그 레벨 (trace, debug, info, warn, error). RUST_LOG가 있으면 그쪽이 우선
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// 로그 형식 (pretty, json, compact). 없으면 LOG_FORMAT 환경 변수
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// 로그 파일 경로. 10 MB마다 순환하며 stderr 출력도 유지
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// 명시적으로 전달된 플래그만 담은 CLI 레이어를 만듭니다.
    pub fn cli_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::new(LayerKind::Cli);
        layer.set_if_present(keys::TICKER, self.ticker.clone());
        layer.set_if_present(keys::DESTINATION, self.destination.clone());
        layer.set_if_present(
            keys::BROKER_BOOTSTRAP_SERVERS,
            self.broker_bootstrap_servers.clone(),
        );
        layer.set_if_present(keys::BROKER_TOPIC, self.broker_topic.clone());
        layer.set_if_present(keys::LLM_MODEL, self.llm_model.clone());
        layer
    }
}

/// 설정 파일 경로를 결정합니다: 플래그 > `CRYORITHM_CONFIG` > 기본 경로.
pub fn config_file_path(flag: Option<&Path>, env: &EnvSource) -> PathBuf {
    let path = match flag {
        Some(path) => path.to_path_buf(),
        None => env
            .var(CONFIG_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path),
    };
    expand_tilde(&path)
}

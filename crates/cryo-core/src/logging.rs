//! tracing을 사용한 로깅 초기화.
//!
//! - **pretty**: 개발용 사람이 읽기 쉬운 형식
//! - **json**: 로그 집계용 JSON 형식
//! - **compact**: 간결한 한 줄 형식
//!
//! 로그 파일을 지정하면 stderr 출력과 함께 크기 기준으로 순환되는 파일에도 기록합니다.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 로그 파일 순환 크기 기본값 (10 MB).
pub const DEFAULT_ROTATE_BYTES: usize = 10 * 1024 * 1024;

/// 보관할 순환 파일 수 기본값.
pub const DEFAULT_KEEP_FILES: usize = 5;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 로그 레벨 필터 (예: "info", "cryo_core=debug"). `RUST_LOG`가 있으면 그쪽이 우선
    pub level: String,
    /// 출력 형식
    pub format: LogFormat,
    /// 대상(모듈 경로) 포함 여부
    pub with_target: bool,
    /// 로그 파일 경로. `None`이면 stderr만 사용
    pub file: Option<PathBuf>,
    /// 파일이 이 크기를 넘으면 `<file>.1`로 순환
    pub rotate_bytes: usize,
    /// 보관할 순환 파일 수
    pub keep_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_target: true,
            file: None,
            rotate_bytes: DEFAULT_ROTATE_BYTES,
            keep_files: DEFAULT_KEEP_FILES,
        }
    }
}

impl LogConfig {
    /// 새 로그 설정을 생성합니다.
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// 로그 형식을 설정합니다.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// 로그 파일 경로를 설정합니다.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// 순환 크기와 보관 개수를 설정합니다.
    pub fn with_rotation(mut self, rotate_bytes: usize, keep_files: usize) -> Self {
        self.rotate_bytes = rotate_bytes;
        self.keep_files = keep_files;
        self
    }

    /// `LOG_FORMAT` 환경 변수에서 형식을 읽어 적용합니다 (없거나 잘못되면 유지).
    pub fn with_env_format(mut self) -> Self {
        if let Some(format) = std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.format = format;
        }
        self
    }
}

/// 크기 기준으로 순환하는 로그 파일 writer.
pub type RotatingWriter = Mutex<FileRotate<AppendCount>>;

/// 순환 로그 파일을 엽니다. 상위 디렉터리가 없으면 만듭니다.
pub fn rotating_writer(
    path: &Path,
    rotate_bytes: usize,
    keep_files: usize,
) -> std::io::Result<RotatingWriter> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = FileRotate::new(
        path,
        AppendCount::new(keep_files.max(1)),
        ContentLimit::Bytes(rotate_bytes.max(1)),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(Mutex::new(file))
}

/// 파일용 fmt 레이어. 색상 코드 없이 기록합니다.
fn file_layer<S>(
    writer: Option<RotatingWriter>,
    with_target: bool,
) -> Option<fmt::Layer<S, fmt::format::DefaultFields, fmt::format::Format, RotatingWriter>> {
    writer.map(|writer| {
        fmt::layer()
            .with_ansi(false)
            .with_target(with_target)
            .with_writer(writer)
    })
}

/// 주어진 설정으로 전역 로깅을 초기화합니다. 프로세스당 한 번만 호출합니다.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let file_writer = match &config.file {
        Some(path) => Some(rotating_writer(path, config.rotate_bytes, config.keep_files)?),
        None => None,
    };

    // 로그는 stderr로 보내 stdout을 스트리밍 출력 전용으로 둠
    match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_target(config.with_target),
            )
            .with(file_layer(file_writer, config.with_target))
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(config.with_target)
                    .with_current_span(true),
            )
            .with(file_layer(file_writer, config.with_target))
            .try_init()?,
        LogFormat::Compact => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(config.with_target),
            )
            .with(file_layer(file_writer, config.with_target))
            .try_init()?,
    }

    Ok(())
}

//! Cryorithm 센서 실행 파일.

use clap::Parser;
use cryo_cli::Cli;
use cryo_core::config::expand_tilde;
use cryo_core::{init_logging, LogConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일이 없어도 무시
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // 로깅 초기화
    let mut log_config = LogConfig::new(&cli.log_level).with_env_format();
    if let Some(format) = cli.log_format {
        log_config = log_config.with_format(format);
    }
    if let Some(path) = &cli.log_file {
        log_config = log_config.with_file(expand_tilde(path));
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    let code = cryo_cli::run(cli).await?;
    std::process::exit(code);
}

//! Cryorithm 센서 CLI.
//!
//! 이 crate는 다음을 제공합니다:
//! - 명령줄 인자 파싱과 CLI 설정 레이어
//! - 설정 해석부터 종료 코드까지 한 번의 실행 흐름

pub mod app;
pub mod cli;

pub use app::{build_pipeline, build_sensor, exit_code, run, run_once, run_with_env};
pub use cli::{config_file_path, Cli};

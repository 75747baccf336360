//! 한 번의 센서 실행: 설정 해석 → 어댑터 구성 → 파이프라인 실행 → 종료 코드.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use cryo_core::config::{ConfigLayer, ConfigResolver, EnvSource, DEFAULT_ENV_PREFIX};
use cryo_core::{
    Configuration, DeliveryError, Destination, RunOutcome, Sensor, SignalPipeline,
};
use cryo_data::{YahooFundamentalSensor, YahooSensorConfig};
use cryo_notification::{
    KafkaRestPublisher, OpenAiChatClient, OpenAiConfig, StdoutFragments, TracingEventLog,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cli::{config_file_path, Cli};

/// 실행 결과를 프로세스 종료 코드로 변환합니다.
pub fn exit_code(result: &Result<RunOutcome, DeliveryError>) -> i32 {
    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => e.exit_code(),
    }
}

/// 해석된 각 키의 출처를 debug 레벨로 기록합니다. 비밀 값은 이미 가려져 있습니다.
fn log_provenance(config: &Configuration) {
    for (key, value, source) in config.entries() {
        debug!(key = %key, value = %value, source = %source, "설정 값");
    }
}

/// 설정에 맞는 싱크를 연결한 파이프라인을 만듭니다.
pub fn build_pipeline(config: &Configuration) -> anyhow::Result<SignalPipeline> {
    let pipeline = SignalPipeline::new(Arc::new(TracingEventLog::new()));

    let pipeline = match config.destination() {
        Destination::Log => pipeline,
        Destination::Broker => {
            let publisher = KafkaRestPublisher::new().context("Kafka REST 클라이언트 생성 실패")?;
            pipeline.with_broker(Arc::new(publisher))
        }
        Destination::Llm => {
            let settings = config
                .llm()
                .context("LLM 설정이 없습니다")?;
            let mut openai = OpenAiConfig::new(settings.api_key.clone());
            if let Some(base_url) = &settings.base_url {
                openai = openai.with_base_url(base_url.clone());
            }
            if let Some(max_tokens) = settings.max_tokens {
                openai = openai.with_max_tokens(max_tokens);
            }
            if let Some(temperature) = settings.temperature {
                openai = openai.with_temperature(temperature as f32);
            }
            let client = OpenAiChatClient::new(openai).context("OpenAI 클라이언트 생성 실패")?;
            pipeline.with_chat(Arc::new(client), Arc::new(StdoutFragments::new()))
        }
    };

    Ok(pipeline)
}

/// 설정된 티커에 대한 센서를 만듭니다.
pub fn build_sensor(config: &Configuration) -> anyhow::Result<YahooFundamentalSensor> {
    let mut sensor_config = YahooSensorConfig::default();
    if let Some(timeout) = config.sensor_timeout() {
        sensor_config.timeout = timeout;
    }
    YahooFundamentalSensor::with_config(config.ticker(), sensor_config)
        .context("Yahoo Finance 센서 생성 실패")
}

/// 파이프라인을 한 번 실행합니다. Ctrl-C는 `cancel`을 발동시킵니다.
pub async fn run_once(
    pipeline: &SignalPipeline,
    sensor: &dyn Sensor,
    config: &Configuration,
    cancel: CancellationToken,
) -> Result<RunOutcome, DeliveryError> {
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C 수신, 실행을 취소합니다");
                cancel.cancel();
            }
        })
    };

    let result = pipeline.run(sensor, config, &cancel).await;
    watcher.abort();
    result
}

/// CLI 진입점. 프로세스 환경 변수로 설정을 해석하고 종료 코드를 반환합니다.
///
/// 설정 에러와 전달 실패는 종료 코드로 변환되고, 그 밖의 예기치 못한 실패만
/// `Err`로 반환됩니다.
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    run_with_env(cli, EnvSource::Process).await
}

/// 주어진 환경 변수 소스로 [`run`]과 같은 흐름을 실행합니다.
pub async fn run_with_env(cli: Cli, env: EnvSource) -> anyhow::Result<i32> {
    let config_path = config_file_path(cli.config_path.as_deref(), &env);
    debug!(path = %config_path.display(), "설정 파일 경로");

    let config = match ConfigResolver::with_env(env).resolve(
        ConfigLayer::system_defaults(),
        Some(&config_path),
        DEFAULT_ENV_PREFIX,
        cli.cli_layer(),
    ) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "설정 오류");
            return Ok(e.exit_code());
        }
    };
    log_provenance(&config);

    info!(
        ticker = %config.ticker(),
        destination = %config.destination(),
        "Cryorithm 센서 실행"
    );

    let sensor = build_sensor(&config)?;
    let pipeline = build_pipeline(&config)?;

    let result = run_once(&pipeline, &sensor, &config, CancellationToken::new()).await;

    match &result {
        Ok(RunOutcome::NoData) => info!("수집된 데이터 없음"),
        Ok(RunOutcome::Delivered { sink, content }) => {
            if content.is_some() {
                // 스트리밍 출력 뒤 줄바꿈
                let mut stdout = std::io::stdout();
                writeln!(stdout).context("stdout 쓰기 실패")?;
            }
            info!(sink = %sink, "전달 완료");
        }
        Ok(RunOutcome::Cancelled) => warn!("실행 취소됨"),
        Err(e) => {
            if let Some(partial) = &e.partial {
                warn!(chars = partial.len(), "부분 응답만 출력됨");
            }
            error!(error = %e, "전달 실패");
        }
    }

    Ok(exit_code(&result))
}

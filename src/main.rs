use std::error::Error;
#[cfg(debug_assertions)]
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

#[cfg(debug_assertions)]
use chrono::Local;
use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::{error, info, LevelFilter};

use housing_eval::config::Settings;
use housing_eval::db::{Database, Partitioner};
use housing_eval::engine::MadlibEngine;
use housing_eval::error::{Result, EXIT_FAILURE};
use housing_eval::pipeline::report::{ReportFormat, ReportFormatter};
use housing_eval::pipeline::ModelRunner;

/// 하우징 데이터 동네별 파티션 및 회귀 모델 평가
#[derive(Parser, Debug)]
#[command(name = "housing-eval", version, about)]
struct Cli {
    /// 파이프라인 설정 파일 (기본: PIPELINE_CONFIG_FILE 또는 ./pipeline.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// DB 설정 파일 (기본: DB_CONFIG_FILE 또는 ./db.yml)
    #[arg(long, global = true)]
    db_config: Option<PathBuf>,

    /// 결과 출력 형식
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text, global = true)]
    format: ReportFormat,

    /// 상세 로그 (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 원본 테이블을 동네별 테이블로 분리
    Partition,
    /// 설정된 모델을 학습하고 테스트 테이블로 평가
    Evaluate,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logger(cli.verbose);

    let started = Instant::now();
    let result = run(&cli).await;
    let elapsed = humantime::format_duration(Duration::from_secs(started.elapsed().as_secs()));

    match result {
        Ok(code) => {
            info!("housing-eval 종료 ({})", elapsed);
            ExitCode::from(code)
        }
        Err(e) => {
            error!("housing-eval 실패 ({}): {}", elapsed, e.full_message());
            eprintln!("housing-eval: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  원인: {}", cause);
                source = cause.source();
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// 명령 실행 후 종료 코드 반환
async fn run(cli: &Cli) -> Result<u8> {
    let settings = Settings::load(cli.db_config.as_deref(), cli.config.as_deref())?;
    settings.log_settings();

    let database = Database::connect(&settings.database).await?;
    let executor = database.acquire().await?;
    let formatter = ReportFormatter::new(cli.format);

    let outcome = match cli.command {
        Command::Partition => {
            info!("동네별 파티션 생성 시작");
            Partitioner::new(&executor, &settings.pipeline.partition)
                .run()
                .await
                .and_then(|summary| {
                    for line in formatter.partitions(&summary)? {
                        println!("{}", line);
                    }
                    Ok(0)
                })
        }
        Command::Evaluate => {
            info!("모델 평가 시작");
            let mut engine = MadlibEngine::new(&executor);
            let mut runner = ModelRunner::new(&mut engine, &settings.pipeline.evaluation);
            runner
                .run(|report| {
                    println!("{}", formatter.evaluation(report)?);
                    Ok(())
                })
                .await
                .and_then(|summary| {
                    for failure in &summary.failures {
                        println!("{}", formatter.failure(failure)?);
                    }
                    Ok(if summary.is_success() { 0 } else { EXIT_FAILURE as u8 })
                })
        }
    };

    executor.release();
    database.close();
    outcome
}

/// 로거 설정
///
/// 로그는 stderr 로만 출력하고 stdout 은 결과 출력에 사용한다.
fn setup_logger(verbose: u8) {
    let level = match verbose {
        0 if cfg!(debug_assertions) => LevelFilter::Trace,
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = Builder::new();
    builder.filter(None, level).parse_default_env();

    #[cfg(debug_assertions)]
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{} {} {}:{}] {}",
            Local::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            record.level(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });

    builder.init();
}

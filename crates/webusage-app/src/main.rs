//! # webusage
//!
//! WebUsage 수집 에이전트 진입점.
//! 브라우저 확장이 네이티브 메시징으로 실행하며, stdin/stdout은 메시지 프레임 전용이다.
//! 로그는 stderr로만 쓴다.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use webusage_app::context::{Adapters, OrchestratorContext};
use webusage_app::dispatcher::JobDispatcher;
use webusage_app::expiration::ExpirationGuard;
use webusage_app::lifecycle::LifecycleManager;
use webusage_app::status;
use webusage_core::config::AppConfig;
use webusage_core::config_manager::ConfigManager;
use webusage_network::fetcher::HttpPageFetcher;
use webusage_network::http_sink::HttpDataSink;
use webusage_network::native::NativeBridge;
use webusage_storage::sqlite::SqliteStorage;

/// WebUsage 브라우저 데이터 수집 에이전트
#[derive(Parser, Debug)]
#[command(name = "webusage")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 저장 서버 URL (설정 파일 값을 덮어씀)
    #[arg(long, short = 's')]
    server: Option<String>,

    /// 데이터 저장 경로 (기본: 플랫폼 데이터 디렉토리)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 작업별 체크포인트 출력 후 종료
    #[arg(long)]
    status: bool,

    /// 브라우저가 넘기는 확장 식별 인자 (무시)
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    browser_args: Vec<String>,
}

/// 체크포인트 DB 경로 결정 (CLI 인자 > 설정 > 플랫폼 기본 경로)
fn resolve_db_path(args: &Args, config: &AppConfig) -> PathBuf {
    args.data_dir
        .clone()
        .or_else(|| config.storage.data_dir.clone())
        .or_else(|| ConfigManager::data_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
        .join(&config.storage.db_file)
}

fn open_storage(db_path: &Path) -> Result<Arc<SqliteStorage>> {
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("데이터 디렉토리 생성 실패: {}", dir.display()))?;
    }
    let storage = SqliteStorage::open(db_path)
        .with_context(|| format!("체크포인트 DB 열기 실패: {}", db_path.display()))?;
    Ok(Arc::new(storage))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout은 네이티브 메시징 프레임 전용
    let log_filter = format!(
        "webusage={},webusage_app={},webusage_core={},webusage_storage={},webusage_network={},webusage_monitor={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // 설정 로드
    let config_manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };
    info!("설정 파일: {}", config_manager.config_path().display());

    let mut config = config_manager.get();
    if let Some(server) = &args.server {
        config.server.base_url = server.clone();
    }

    let db_path = resolve_db_path(&args, &config);

    if args.status {
        let storage = open_storage(&db_path)?;
        print!("{}", status::render(&config, storage.as_ref()).await?);
        return Ok(());
    }

    let user_id = config_manager.ensure_user_id()?;
    info!(
        "WebUsage 에이전트 시작: v{}, 서버 {}",
        env!("CARGO_PKG_VERSION"),
        config.server.base_url
    );

    // ── 어댑터 생성 (DI 와이어링) ──

    // 1. 체크포인트 저장소 (파일 기반 SQLite)
    let storage = open_storage(&db_path)?;
    info!("체크포인트 DB: {}", db_path.display());

    // 2. 저장 서버 + 원격 대상 목록
    let sink = Arc::new(
        HttpDataSink::new(
            &config.server.base_url,
            &user_id,
            config.server.request_timeout(),
        )?
        .with_max_retries(config.server.max_retries),
    );

    // 3. 외부 페이지 조회
    let fetcher = Arc::new(HttpPageFetcher::new(
        config.server.request_timeout(),
        config.server.max_retries,
    )?);

    // 4. 브라우저 호스트 (stdin/stdout 네이티브 메시징)
    let (bridge, reader_task) = NativeBridge::stdio(config.snapshot.response_timeout());

    // 5. 라이프사이클
    let lifecycle = Arc::new(LifecycleManager::new());

    // 6. 오케스트레이터 컨텍스트
    let ctx = Arc::new(OrchestratorContext::new(
        config.clone(),
        Adapters {
            host: bridge.clone(),
            notifier: bridge.clone(),
            checkpoints: storage,
            sink: sink.clone(),
            processor: None,
            fetcher,
            targets: sink,
        },
        lifecycle.subscribe(),
    ));
    info!("실행 ID: {}", ctx.run_id);

    // ── 태스크 시작 ──

    let expiration = ExpirationGuard::new(
        config.expiration.clone(),
        bridge.clone(),
        lifecycle.clone(),
    );
    if expiration.check(chrono::Utc::now()).await {
        return Ok(());
    }
    tokio::spawn(expiration.run(lifecycle.subscribe()));

    let compensation = ctx.spawn_background();

    let dispatcher = Arc::new(JobDispatcher::with_defaults());
    let dispatch_task = tokio::spawn(dispatcher.run(ctx.clone(), config.jobs.clone()));

    // 브라우저가 연결을 닫으면 종료
    let bridge_lifecycle = lifecycle.clone();
    tokio::spawn(async move {
        if let Err(e) = reader_task.await {
            error!("메시지 수신 태스크 비정상 종료: {e}");
        }
        bridge_lifecycle.shutdown("브라우저 연결 종료");
    });

    let signal_lifecycle = lifecycle.clone();
    tokio::spawn(async move { signal_lifecycle.wait_for_signal().await });

    let mut shutdown = lifecycle.subscribe();
    let _ = shutdown.wait_for(|stop| *stop).await;

    info!("종료 중...");
    if let Err(e) = dispatch_task.await {
        warn!("디스패처 종료 실패: {e}");
    }
    if let Err(e) = compensation.await {
        warn!("방문 기록 보정 종료 실패: {e}");
    }
    info!("WebUsage 에이전트 종료");
    Ok(())
}

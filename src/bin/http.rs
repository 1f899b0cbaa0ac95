use timetable_engine::{EngineConfig, MemoryScheduleStore, ScheduleStore, TimetableEngine, http_api};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &config.db_path {
        #[cfg(feature = "sqlite")]
        Some(path) => {
            info!(path = %path.display(), "using sqlite store");
            let store = timetable_engine::SqliteScheduleStore::new(path)?;
            run(&config, store).await
        }
        #[cfg(not(feature = "sqlite"))]
        Some(_) => Err("TIMETABLE_DB_PATH is set but the sqlite feature is disabled".into()),
        None => {
            info!("TIMETABLE_DB_PATH not set, schedules are kept in memory");
            run(&config, MemoryScheduleStore::new()).await
        }
    }
}

async fn run<S: ScheduleStore + 'static>(
    config: &EngineConfig,
    store: S,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = TimetableEngine::with_school_week(store, config.school_week.clone());
    info!(
        addr = %config.http_addr,
        year = %config.academic_year,
        "timetable HTTP API listening"
    );
    http_api::serve(config.http_addr, engine).await?;
    Ok(())
}

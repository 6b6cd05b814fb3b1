//! Engine selection and service wiring.
//!
//! # Responsibility
//! - Pick the slot engine once per process from configuration.
//! - Build a ready-to-use booking service over the chosen engine.
//!
//! # Invariants
//! - `auto` falls back to the JSON file only when SQLite cannot be opened.
//! - Forced engines never fall back.

use crate::config::{AppConfig, EngineChoice};
use crate::repo::json_slot_repo::JsonSlotRepository;
use crate::repo::slot_repo::{EngineKind, SlotRepository, StoreResult};
use crate::repo::sqlite_slot_repo::SqliteSlotRepository;
use crate::service::booking_service::BookingService;
use crate::service::clock::SystemClock;
use log::{info, warn};

/// Engine chosen at startup.
pub struct OpenedStore {
    pub repo: Box<dyn SlotRepository>,
    pub engine: EngineKind,
}

/// Opens the configured engine.
pub fn open_store(config: &AppConfig) -> StoreResult<OpenedStore> {
    let opened = match config.engine {
        EngineChoice::Sqlite => sqlite_store(config)?,
        EngineChoice::Json => json_store(config),
        EngineChoice::Auto => match sqlite_store(config) {
            Ok(opened) => opened,
            Err(err) => {
                warn!(
                    "event=engine_select module=bootstrap status=fallback from=sqlite to=json error_code={} error={err}",
                    err.code()
                );
                json_store(config)
            }
        },
    };

    info!(
        "event=engine_select module=bootstrap status=ok engine={}",
        opened.engine
    );
    Ok(opened)
}

/// Opens the configured engine and wraps it in a booking service that uses
/// the configured timezone for "today".
pub fn open_booking_service(
    config: &AppConfig,
) -> StoreResult<(BookingService<Box<dyn SlotRepository>>, EngineKind)> {
    let OpenedStore { repo, engine } = open_store(config)?;
    let service = BookingService::new(
        repo,
        config.booking_policy(),
        Box::new(SystemClock::new(config.timezone)),
    );
    Ok((service, engine))
}

fn sqlite_store(config: &AppConfig) -> StoreResult<OpenedStore> {
    let repo = SqliteSlotRepository::open(&config.db_path)?;
    Ok(OpenedStore {
        repo: Box::new(repo),
        engine: EngineKind::Sqlite,
    })
}

fn json_store(config: &AppConfig) -> OpenedStore {
    OpenedStore {
        repo: Box::new(JsonSlotRepository::new(config.data_path.clone())),
        engine: EngineKind::Json,
    }
}

#[cfg(test)]
mod tests {
    use super::open_store;
    use crate::config::{AppConfig, EngineChoice};
    use crate::repo::slot_repo::EngineKind;

    fn config_in(dir: &std::path::Path, engine: EngineChoice) -> AppConfig {
        AppConfig {
            db_path: dir.join("schedule.db"),
            data_path: dir.join("data.json"),
            engine,
            ..AppConfig::default()
        }
    }

    #[test]
    fn auto_prefers_sqlite_when_it_opens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let opened = open_store(&config_in(dir.path(), EngineChoice::Auto)).expect("open");
        assert_eq!(opened.engine, EngineKind::Sqlite);
        assert_eq!(opened.repo.engine(), EngineKind::Sqlite);
    }

    #[test]
    fn auto_falls_back_to_json_when_sqlite_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path(), EngineChoice::Auto);
        // A directory cannot be opened as a database file.
        config.db_path = dir.path().to_path_buf();

        let opened = open_store(&config).expect("fallback should open");
        assert_eq!(opened.engine, EngineKind::Json);
    }

    #[test]
    fn forced_sqlite_does_not_fall_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path(), EngineChoice::Sqlite);
        config.db_path = dir.path().to_path_buf();

        assert!(open_store(&config).is_err());
    }

    #[test]
    fn forced_json_skips_sqlite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let opened = open_store(&config_in(dir.path(), EngineChoice::Json)).expect("open");
        assert_eq!(opened.engine, EngineKind::Json);
        assert!(!dir.path().join("schedule.db").exists());
    }
}

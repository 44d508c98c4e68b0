use std::path::{Path, PathBuf};

use log::{info, warn};
use rusqlite::Connection;

pub mod cli;
pub mod commands;
pub mod error;
pub mod model;
pub mod normalize;
pub mod query;
pub mod store;

pub use cli::run;
pub use commands::{apply, Applied, Command, Outcome};
pub use error::TrackerError;
pub use model::{CollectionItem, TrackerState, WishlistItem};

use store::{LoadReport, LoadSource, SeedSource};

const DATA_DIR_NAME: &str = "gamecollection";
const DB_FILE_NAME: &str = "gamecollection.db";
const DEFAULT_SEED_FILE: &str = "data/seed.json";

#[derive(Clone, Debug)]
pub struct AppConfig {
  pub data_dir: PathBuf,
  pub db_path: PathBuf,
  pub seed: Option<SeedSource>,
}

impl AppConfig {
  /// Resolves paths: explicit values first, then the platform data dir.
  ///
  /// Without an explicit seed, `data/seed.json` is used only when it exists.
  pub fn resolve(data_dir: Option<PathBuf>, seed: Option<&str>) -> Self {
    let data_dir = data_dir
      .or_else(|| dirs::data_dir().map(|dir| dir.join(DATA_DIR_NAME)))
      .unwrap_or_else(|| PathBuf::from(format!(".{}", DATA_DIR_NAME)));
    let seed = match seed {
      Some(raw) if !raw.trim().is_empty() => Some(SeedSource::parse(raw)),
      _ => Some(PathBuf::from(DEFAULT_SEED_FILE))
        .filter(|path| path.exists())
        .map(SeedSource::File),
    };

    AppConfig {
      db_path: data_dir.join(DB_FILE_NAME),
      data_dir,
      seed,
    }
  }

  pub fn in_dir(data_dir: &Path) -> Self {
    AppConfig {
      data_dir: data_dir.to_path_buf(),
      db_path: data_dir.join(DB_FILE_NAME),
      seed: None,
    }
  }
}

/// One session over the persisted store.
///
/// Every successful mutating command is written back before it returns.
pub struct Tracker {
  connection: Connection,
  state: TrackerState,
  backup_on_import: bool,
}

impl Tracker {
  pub fn open(config: &AppConfig) -> Result<(Self, LoadReport), TrackerError> {
    store::init_database(&config.db_path)?;
    let connection = store::open_database(&config.db_path)?;
    let report = store::load_state(&connection, config.seed.as_ref());

    if report.source == LoadSource::Seed {
      store::write_state(&connection, &report.state)?;
    }

    let tracker = Tracker {
      connection,
      state: report.state.clone(),
      backup_on_import: true,
    };
    Ok((tracker, report))
  }

  pub fn state(&self) -> &TrackerState {
    &self.state
  }

  pub fn set_backup_on_import(&mut self, enabled: bool) {
    self.backup_on_import = enabled;
  }

  pub fn dispatch(&mut self, command: Command) -> Result<Outcome, TrackerError> {
    let is_import = matches!(command, Command::Import(_));
    let applied = match apply(&self.state, command) {
      Ok(applied) => applied,
      Err(error) => {
        if error.is_rejection() {
          warn!("rejected: {}", error);
        }
        return Err(error);
      }
    };

    if applied.changed() {
      if is_import && self.backup_on_import {
        let backup_id = store::backup_state(&self.connection, &self.state, "import")?;
        info!("backed up previous state as #{}", backup_id);
      }
      store::write_state(&self.connection, &applied.state)?;
      info!("persisted state after {}", applied.outcome.kind());
    }

    self.state = applied.state;
    Ok(applied.outcome)
  }

  pub fn backups(&self) -> Result<Vec<store::BackupDto>, TrackerError> {
    store::list_backups(&self.connection)
  }
}

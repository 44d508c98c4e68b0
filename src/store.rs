use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;

use crate::error::TrackerError;
use crate::model::{iso_timestamp, TrackerState};
use crate::normalize::{has_usable_ids, normalize_payload};

const MIGRATION_SQL_0001: &str = include_str!("../migrations/0001_initial.sql");
pub const STATE_KEY: &str = "game-collection-state-v1";
const SEED_FETCH_TIMEOUT_SECONDS: u64 = 30;

pub fn init_database(db_path: &Path) -> Result<(), TrackerError> {
  if let Some(parent) = db_path.parent() {
    fs::create_dir_all(parent)?;
  }

  let connection = Connection::open(db_path)?;
  connection.execute_batch(MIGRATION_SQL_0001)?;
  Ok(())
}

pub fn open_database(db_path: &Path) -> Result<Connection, TrackerError> {
  Ok(Connection::open(db_path)?)
}

pub fn read_state_value(connection: &Connection) -> Result<Option<String>, TrackerError> {
  let value = connection
    .query_row(
      "SELECT value FROM kv_store WHERE key = ?1 LIMIT 1",
      params![STATE_KEY],
      |row| row.get(0),
    )
    .optional()?;
  Ok(value)
}

pub fn write_state(connection: &Connection, state: &TrackerState) -> Result<(), TrackerError> {
  let value = serde_json::to_string(state)?;
  connection.execute(
    "INSERT INTO kv_store (key, value, updated_at)
     VALUES (?1, ?2, ?3)
     ON CONFLICT(key) DO UPDATE SET
       value = excluded.value,
       updated_at = excluded.updated_at",
    params![STATE_KEY, value, iso_timestamp(Utc::now())],
  )?;
  Ok(())
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupDto {
  pub id: i64,
  pub reason: String,
  pub created_at: String,
  pub collection_count: usize,
  pub wishlist_count: usize,
}

/// Copies the current state into `state_backups` and returns the backup id.
pub fn backup_state(
  connection: &Connection,
  state: &TrackerState,
  reason: &str,
) -> Result<i64, TrackerError> {
  let value = serde_json::to_string(state)?;
  connection.execute(
    "INSERT INTO state_backups (reason, created_at, value) VALUES (?1, ?2, ?3)",
    params![reason, iso_timestamp(Utc::now()), value],
  )?;
  Ok(connection.last_insert_rowid())
}

pub fn list_backups(connection: &Connection) -> Result<Vec<BackupDto>, TrackerError> {
  let mut statement = connection.prepare(
    "SELECT id, reason, created_at, value
     FROM state_backups
     ORDER BY id DESC",
  )?;

  let rows = statement.query_map([], |row| {
    Ok((
      row.get::<usize, i64>(0)?,
      row.get::<usize, String>(1)?,
      row.get::<usize, String>(2)?,
      row.get::<usize, String>(3)?,
    ))
  })?;

  let mut backups = Vec::new();
  for row in rows {
    let (id, reason, created_at, value) = row?;
    let state: TrackerState = match serde_json::from_str(&value) {
      Ok(state) => state,
      Err(error) => {
        warn!("skipping unreadable backup #{}: {}", id, error);
        continue;
      }
    };
    backups.push(BackupDto {
      id,
      reason,
      created_at,
      collection_count: state.collection.len(),
      wishlist_count: state.wishlist.len(),
    });
  }

  Ok(backups)
}

/// Where seed data comes from when nothing has been persisted yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SeedSource {
  File(PathBuf),
  Url(String),
}

impl SeedSource {
  pub fn parse(raw: &str) -> Self {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
      SeedSource::Url(trimmed.to_string())
    } else {
      SeedSource::File(PathBuf::from(trimmed))
    }
  }
}

fn fetch_seed_body(url: &str) -> Result<String, TrackerError> {
  let client = Client::builder()
    .timeout(Duration::from_secs(SEED_FETCH_TIMEOUT_SECONDS))
    .build()?;

  let response = client
    .get(url)
    .header(USER_AGENT, concat!("gamecollection/", env!("CARGO_PKG_VERSION")))
    .header(ACCEPT, "application/json,text/plain,*/*")
    .send()?;

  if !response.status().is_success() {
    return Err(TrackerError::LoadFailure(format!(
      "seed request to {} failed with status {}",
      url,
      response.status()
    )));
  }

  Ok(response.text()?)
}

pub fn read_seed(source: &SeedSource) -> Result<Value, TrackerError> {
  let body = match source {
    SeedSource::File(path) => fs::read_to_string(path).map_err(|e| {
      TrackerError::LoadFailure(format!("cannot read seed {}: {}", path.display(), e))
    })?,
    SeedSource::Url(url) => fetch_seed_body(url)?,
  };
  serde_json::from_str(&body).map_err(|e| TrackerError::LoadFailure(format!("seed is not JSON: {}", e)))
}

/// Reads an import file. Anything that is not parseable JSON is an invalid format.
pub fn read_json_file(path: &Path) -> Result<Value, TrackerError> {
  let body = fs::read_to_string(path)?;
  serde_json::from_str(&body)
    .map_err(|e| TrackerError::InvalidFormat(format!("{} is not valid JSON: {}", path.display(), e)))
}

pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), TrackerError> {
  if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
    fs::create_dir_all(parent)?;
  }
  let mut body = serde_json::to_string_pretty(value)?;
  body.push('\n');
  fs::write(path, body)?;
  Ok(())
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
  Persisted,
  Seed,
  Empty,
}

#[derive(Clone, Debug)]
pub struct LoadReport {
  pub state: TrackerState,
  pub source: LoadSource,
  pub warning: Option<String>,
}

impl LoadReport {
  fn empty(warning: Option<String>) -> Self {
    LoadReport {
      state: TrackerState::default(),
      source: LoadSource::Empty,
      warning,
    }
  }
}

fn load_persisted(connection: &Connection) -> Result<Option<TrackerState>, TrackerError> {
  let Some(value) = read_state_value(connection)? else {
    return Ok(None);
  };
  if let Ok(state) = serde_json::from_str::<TrackerState>(&value) {
    if has_usable_ids(&state) {
      return Ok(Some(state));
    }
  }

  // Loose or hand-edited values go through the engine and get fresh ids.
  let payload: Value = serde_json::from_str(&value)
    .map_err(|e| TrackerError::LoadFailure(format!("persisted state is not JSON: {}", e)))?;
  normalize_payload(&payload)
    .map(Some)
    .map_err(|e| TrackerError::LoadFailure(e.to_string()))
}

/// Startup load: persisted state, else seed, else empty.
///
/// Never fails; a load failure becomes a warning on an empty report.
pub fn load_state(connection: &Connection, seed: Option<&SeedSource>) -> LoadReport {
  match load_persisted(connection) {
    Ok(Some(state)) => {
      info!(
        "loaded persisted state: {} collection, {} wishlist",
        state.collection.len(),
        state.wishlist.len()
      );
      return LoadReport {
        state,
        source: LoadSource::Persisted,
        warning: None,
      };
    }
    Ok(None) => {}
    Err(error) => {
      warn!("{}", error);
      return LoadReport::empty(Some(error.to_string()));
    }
  }

  let Some(seed) = seed else {
    return LoadReport::empty(None);
  };

  match read_seed(seed).and_then(|payload| normalize_payload(&payload)) {
    Ok(state) => {
      info!(
        "loaded seed {:?}: {} collection, {} wishlist",
        seed,
        state.collection.len(),
        state.wishlist.len()
      );
      LoadReport {
        state,
        source: LoadSource::Seed,
        warning: None,
      }
    }
    Err(error) => {
      warn!("seed load failed: {}", error);
      LoadReport::empty(Some(error.to_string()))
    }
  }
}

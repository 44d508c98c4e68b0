use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
  /// Top-level payload is not a JSON object.
  #[error("invalid format: {0}")]
  InvalidFormat(String),
  #[error("{0}")]
  ValidationFailed(String),
  #[error("'{title}' ({platform}) is already in the {list}")]
  DuplicateEntry {
    list: &'static str,
    platform: String,
    title: String,
  },
  #[error("load failed: {0}")]
  LoadFailure(String),
  #[error("storage: {0}")]
  Storage(#[from] rusqlite::Error),
  #[error("io: {0}")]
  Io(#[from] std::io::Error),
  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
  #[error("http: {0}")]
  Http(#[from] reqwest::Error),
}

impl TrackerError {
  /// Recoverable, user-correctable rejections of a create operation.
  pub fn is_rejection(&self) -> bool {
    matches!(
      self,
      TrackerError::ValidationFailed(_) | TrackerError::DuplicateEntry { .. }
    )
  }
}

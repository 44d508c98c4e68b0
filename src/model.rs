use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// `2026-02-09T12:00:00.000Z`
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
  pub id: String,
  pub platform: String,
  pub title: String,
  pub version: String,
  pub cd_condition: String,
  pub manual_condition: String,
  pub price: String,
  pub extra: String,
  pub note: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
  pub id: String,
  pub platform: String,
  pub title: String,
  pub note: String,
  pub in_transit: bool,
  pub received: bool,
}

/// Canonical in-memory state: both lists, validated and deduplicated.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackerState {
  pub collection: Vec<CollectionItem>,
  pub wishlist: Vec<WishlistItem>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
  pub schema_version: u32,
  pub exported_at: String,
  pub collection: Vec<CollectionItem>,
  pub wishlist: Vec<WishlistItem>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeedSnapshot {
  pub generated_at: String,
  pub collection: Vec<CollectionItem>,
  pub wishlist: Vec<WishlistItem>,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewCollectionItem {
  pub platform: String,
  pub title: String,
  #[serde(default)]
  pub version: String,
  #[serde(default)]
  pub cd_condition: String,
  #[serde(default)]
  pub manual_condition: String,
  #[serde(default)]
  pub price: String,
  #[serde(default)]
  pub extra: String,
  #[serde(default)]
  pub note: String,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewWishlistItem {
  pub platform: String,
  pub title: String,
  #[serde(default)]
  pub note: String,
  #[serde(default)]
  pub in_transit: bool,
}

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveOutcome {
  pub moved: bool,
  pub duplicate: bool,
}

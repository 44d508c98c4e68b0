//! Coerces untrusted JSON into canonical [`TrackerState`].
//!
//! The same path handles persisted state, imported snapshots and seed files,
//! so nothing downstream needs to know where a payload came from.

use std::cmp::Ordering;
use std::collections::HashSet;

use log::debug;
use serde_json::{Map, Value};

use crate::error::TrackerError;
use crate::model::{CollectionItem, TrackerState, WishlistItem};

const KEY_SEPARATOR: &str = "::";

/// Trimmed string form of a raw JSON scalar. Null, arrays and objects become empty.
pub fn coerce_text(value: Option<&Value>) -> String {
  match value {
    Some(Value::String(text)) => text.trim().to_string(),
    Some(Value::Number(number)) => number.to_string(),
    Some(Value::Bool(flag)) => flag.to_string(),
    _ => String::new(),
  }
}

pub fn coerce_bool(value: Option<&Value>) -> bool {
  if let Some(Value::Bool(flag)) = value {
    return *flag;
  }
  matches!(
    coerce_text(value).to_lowercase().as_str(),
    "true" | "1" | "yes" | "x"
  )
}

fn row_text(row: &Map<String, Value>, keys: &[&str]) -> String {
  keys
    .iter()
    .find_map(|key| row.get(*key))
    .map(|value| coerce_text(Some(value)))
    .unwrap_or_default()
}

fn row_bool(row: &Map<String, Value>, keys: &[&str]) -> bool {
  keys
    .iter()
    .find_map(|key| row.get(*key))
    .map(|value| coerce_bool(Some(value)))
    .unwrap_or(false)
}

/// Comparison form of free text: trimmed and lowercased.
pub fn normalize_text(value: &str) -> String {
  value.trim().to_lowercase()
}

/// Comparison form of a platform name: lowercased, alphanumerics only.
pub fn platform_key(value: &str) -> String {
  value
    .trim()
    .to_lowercase()
    .chars()
    .filter(|c| c.is_alphanumeric())
    .collect()
}

pub fn dedup_key(platform: &str, title: &str) -> String {
  format!(
    "{}{}{}",
    platform_key(platform),
    KEY_SEPARATOR,
    normalize_text(title)
  )
}

/// Next identifier above every numeric suffix currently in use.
///
/// The first run of digits in each id is its number; ids without one count as 0.
pub fn next_id<'a>(prefix: &str, ids: impl IntoIterator<Item = &'a str>) -> String {
  let max = ids.into_iter().map(id_number).max().unwrap_or(0);
  format!("{}{}", prefix, max.saturating_add(1))
}

pub fn id_number(id: &str) -> u64 {
  let digits: String = id
    .chars()
    .skip_while(|c| !c.is_ascii_digit())
    .take_while(|c| c.is_ascii_digit())
    .collect();
  digits.parse::<u64>().unwrap_or(0)
}

fn display_order(platform_a: &str, title_a: &str, platform_b: &str, title_b: &str) -> Ordering {
  platform_a
    .cmp(platform_b)
    .then_with(|| title_a.cmp(title_b))
}

pub fn sort_collection(rows: &mut [CollectionItem]) {
  rows.sort_by(|a, b| display_order(&a.platform, &a.title, &b.platform, &b.title));
}

pub fn sort_wishlist(rows: &mut [WishlistItem]) {
  rows.sort_by(|a, b| display_order(&a.platform, &a.title, &b.platform, &b.title));
}

fn array_rows<'a>(
  payload: &'a Map<String, Value>,
  field: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> {
  payload
    .get(field)
    .and_then(Value::as_array)
    .map(|rows| rows.as_slice())
    .unwrap_or_default()
    .iter()
    .filter_map(Value::as_object)
}

fn parse_collection_row(row: &Map<String, Value>) -> Option<CollectionItem> {
  let platform = row_text(row, &["platform"]);
  let title = row_text(row, &["title"]);
  if platform.is_empty() || title.is_empty() {
    return None;
  }

  Some(CollectionItem {
    id: String::new(),
    platform,
    title,
    version: row_text(row, &["version"]),
    cd_condition: row_text(row, &["cdCondition", "cd_condition"]),
    manual_condition: row_text(row, &["manualCondition", "manual_condition"]),
    price: row_text(row, &["price"]),
    extra: row_text(row, &["extra"]),
    note: row_text(row, &["note"]),
  })
}

fn parse_wishlist_row(row: &Map<String, Value>) -> Option<WishlistItem> {
  let platform = row_text(row, &["platform"]);
  let title = row_text(row, &["title"]);
  if platform.is_empty() || title.is_empty() {
    return None;
  }

  Some(WishlistItem {
    id: String::new(),
    platform,
    title,
    note: row_text(row, &["note"]),
    in_transit: row_bool(row, &["inTransit", "in_transit"]),
    received: row_bool(row, &["received"]),
  })
}

/// True when every row carries a non-empty id that is unique within its list.
pub fn has_usable_ids(state: &TrackerState) -> bool {
  let mut collection_ids = HashSet::new();
  let mut wishlist_ids = HashSet::new();
  state
    .collection
    .iter()
    .all(|item| !item.id.is_empty() && collection_ids.insert(item.id.as_str()))
    && state
      .wishlist
      .iter()
      .all(|item| !item.id.is_empty() && wishlist_ids.insert(item.id.as_str()))
}

/// Collection row created when a wishlist entry has arrived.
pub fn received_to_collection(wish: &WishlistItem) -> CollectionItem {
  CollectionItem {
    id: String::new(),
    platform: wish.platform.clone(),
    title: wish.title.clone(),
    note: wish.note.clone(),
    ..CollectionItem::default()
  }
}

/// Builds canonical state from an arbitrary payload.
///
/// Fails only when the payload itself is not an object; malformed lists and
/// rows degrade to nothing. First occurrence of a dedup key wins, received
/// wishlist rows migrate into the collection, and ids are reassigned in
/// sorted order.
pub fn normalize_payload(payload: &Value) -> Result<TrackerState, TrackerError> {
  let Some(object) = payload.as_object() else {
    return Err(TrackerError::InvalidFormat(
      "expected a JSON object with 'collection' and 'wishlist' arrays".to_string(),
    ));
  };

  let mut collection_keys = HashSet::new();
  let mut collection = Vec::new();
  let mut dropped = 0_usize;
  for row in array_rows(object, "collection") {
    let Some(item) = parse_collection_row(row) else {
      dropped += 1;
      continue;
    };
    if !collection_keys.insert(dedup_key(&item.platform, &item.title)) {
      dropped += 1;
      continue;
    }
    collection.push(item);
  }

  let mut wishlist_keys = HashSet::new();
  let mut wishlist = Vec::new();
  let mut migrated = 0_usize;
  for row in array_rows(object, "wishlist") {
    let Some(mut wish) = parse_wishlist_row(row) else {
      dropped += 1;
      continue;
    };
    let key = dedup_key(&wish.platform, &wish.title);
    if wish.received {
      if collection_keys.insert(key) {
        collection.push(received_to_collection(&wish));
        migrated += 1;
      }
      continue;
    }
    if !wishlist_keys.insert(key) {
      dropped += 1;
      continue;
    }
    wish.received = false;
    wishlist.push(wish);
  }

  sort_collection(&mut collection);
  sort_wishlist(&mut wishlist);
  for (index, item) in collection.iter_mut().enumerate() {
    item.id = format!("c{}", index + 1);
  }
  for (index, item) in wishlist.iter_mut().enumerate() {
    item.id = format!("w{}", index + 1);
  }

  debug!(
    "normalized payload: {} collection, {} wishlist, {} migrated, {} dropped",
    collection.len(),
    wishlist.len(),
    migrated,
    dropped
  );

  Ok(TrackerState {
    collection,
    wishlist,
  })
}

/// Runs already-typed state back through the engine (used before export).
pub fn normalize_state(state: &TrackerState) -> Result<TrackerState, TrackerError> {
  normalize_payload(&serde_json::to_value(state)?)
}

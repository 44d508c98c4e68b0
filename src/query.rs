use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::model::{CollectionItem, TrackerState, WishlistItem};
use crate::normalize::{normalize_text, platform_key};

pub const BASE_PLATFORMS: [&str; 4] = ["PS1", "PS2", "PS4", "DS WII"];

/// Platform selector for the collection view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformFilter {
  All,
  Only(String),
}

impl PlatformFilter {
  /// `"all"` (any casing) or an empty string selects every platform.
  pub fn parse(value: &str) -> Self {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
      PlatformFilter::All
    } else {
      PlatformFilter::Only(trimmed.to_string())
    }
  }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCount {
  pub platform: String,
  pub count: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCounts {
  pub all: usize,
  pub by_key: BTreeMap<String, usize>,
}

impl PlatformCounts {
  pub fn count_for(&self, platform: &str) -> usize {
    self.by_key.get(&platform_key(platform)).copied().unwrap_or(0)
  }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
  pub collection_total: usize,
  pub wishlist_total: usize,
  pub in_transit: usize,
  pub platforms: usize,
}

/// Base platforms first, then every other observed platform in display order.
pub fn platform_catalog(state: &TrackerState) -> Vec<String> {
  let mut seen: HashSet<String> = BASE_PLATFORMS.iter().map(|name| platform_key(name)).collect();
  let mut extra = Vec::new();

  let observed = state
    .collection
    .iter()
    .map(|item| item.platform.as_str())
    .chain(state.wishlist.iter().map(|item| item.platform.as_str()));
  for platform in observed {
    let trimmed = platform.trim();
    if trimmed.is_empty() {
      continue;
    }
    if seen.insert(platform_key(trimmed)) {
      extra.push(trimmed.to_string());
    }
  }
  extra.sort();

  BASE_PLATFORMS
    .iter()
    .map(|name| name.to_string())
    .chain(extra)
    .collect()
}

fn matches_query(query: &str, fields: &[&str]) -> bool {
  if query.is_empty() {
    return true;
  }
  let haystack = fields
    .iter()
    .map(|field| normalize_text(field))
    .collect::<Vec<_>>()
    .join(" ");
  haystack.contains(query)
}

pub fn filter_collection<'a>(
  state: &'a TrackerState,
  platform: &PlatformFilter,
  query: &str,
) -> Vec<&'a CollectionItem> {
  let query = normalize_text(query);
  let selected = match platform {
    PlatformFilter::All => None,
    PlatformFilter::Only(name) => Some(platform_key(name)),
  };

  state
    .collection
    .iter()
    .filter(|item| {
      selected
        .as_deref()
        .map_or(true, |key| platform_key(&item.platform) == key)
    })
    .filter(|item| {
      matches_query(
        &query,
        &[
          item.title.as_str(),
          item.version.as_str(),
          item.note.as_str(),
          item.extra.as_str(),
          item.platform.as_str(),
        ],
      )
    })
    .collect()
}

/// An empty platform selects every row; otherwise the display name must match exactly.
pub fn filter_wishlist<'a>(state: &'a TrackerState, platform: &str, query: &str) -> Vec<&'a WishlistItem> {
  let query = normalize_text(query);
  let platform = platform.trim();

  state
    .wishlist
    .iter()
    .filter(|item| platform.is_empty() || item.platform == platform)
    .filter(|item| {
      matches_query(
        &query,
        &[item.title.as_str(), item.note.as_str(), item.platform.as_str()],
      )
    })
    .collect()
}

pub fn platform_counts(state: &TrackerState) -> PlatformCounts {
  let mut by_key: BTreeMap<String, usize> = BTreeMap::new();
  for item in &state.collection {
    *by_key.entry(platform_key(&item.platform)).or_insert(0) += 1;
  }
  PlatformCounts {
    all: state.collection.len(),
    by_key,
  }
}

/// Catalog entries paired with their collection counts.
pub fn platform_summary(state: &TrackerState) -> Vec<PlatformCount> {
  let counts = platform_counts(state);
  platform_catalog(state)
    .into_iter()
    .map(|platform| PlatformCount {
      count: counts.count_for(&platform),
      platform,
    })
    .collect()
}

pub fn stats(state: &TrackerState) -> Stats {
  Stats {
    collection_total: state.collection.len(),
    wishlist_total: state.wishlist.len(),
    in_transit: state.wishlist.iter().filter(|item| item.in_transit).count(),
    platforms: platform_catalog(state).len(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::normalize::normalize_payload;
  use serde_json::json;

  fn sample() -> TrackerState {
    normalize_payload(&json!({
      "collection": [
        { "platform": "PS2", "title": "Okami", "version": "PAL", "note": "boxed" },
        { "platform": "PS2", "title": "Ico", "extra": "art book" },
        { "platform": "PS1", "title": "Vagrant Story" },
        { "platform": "GameCube", "title": "Ikaruga" },
        { "platform": "ds-wii", "title": "Mario Kart" }
      ],
      "wishlist": [
        { "platform": "PS2", "title": "Rez", "inTransit": true },
        { "platform": "Dreamcast", "title": "Shenmue", "note": "pal copy" },
        { "platform": "gamecube", "title": "Metroid Prime" }
      ]
    }))
    .unwrap()
  }

  fn collection_titles(rows: &[&CollectionItem]) -> Vec<String> {
    rows.iter().map(|item| item.title.clone()).collect()
  }

  #[test]
  fn catalog_appends_observed_platforms_once() {
    let catalog = platform_catalog(&sample());
    assert_eq!(
      catalog,
      vec!["PS1", "PS2", "PS4", "DS WII", "Dreamcast", "GameCube"]
    );
  }

  #[test]
  fn catalog_reflects_new_platforms_immediately() {
    let mut state = sample();
    state.collection.push(CollectionItem {
      id: "c99".to_string(),
      platform: "Amiga".to_string(),
      title: "Lemmings".to_string(),
      ..CollectionItem::default()
    });
    assert!(platform_catalog(&state).contains(&"Amiga".to_string()));
  }

  #[test]
  fn collection_filter_by_platform_key_and_query() {
    let state = sample();
    let ds = filter_collection(&state, &PlatformFilter::parse("DS WII"), "");
    assert_eq!(collection_titles(&ds), vec!["Mario Kart"]);

    let ps2 = filter_collection(&state, &PlatformFilter::Only("ps2".to_string()), "");
    assert_eq!(ps2.len(), 2);

    let by_version = filter_collection(&state, &PlatformFilter::All, " pal ");
    assert_eq!(collection_titles(&by_version), vec!["Okami"]);

    let by_extra = filter_collection(&state, &PlatformFilter::All, "ART BOOK");
    assert_eq!(collection_titles(&by_extra), vec!["Ico"]);

    let by_platform_text = filter_collection(&state, &PlatformFilter::All, "gamecube");
    assert_eq!(by_platform_text.len(), 1);

    assert_eq!(filter_collection(&state, &PlatformFilter::parse("all"), "").len(), 5);
  }

  #[test]
  fn wishlist_filter_uses_exact_platform() {
    let state = sample();
    assert_eq!(filter_wishlist(&state, "", "").len(), 3);
    assert_eq!(filter_wishlist(&state, "Dreamcast", "").len(), 1);
    assert!(filter_wishlist(&state, "GameCube", "").is_empty());

    let by_note = filter_wishlist(&state, "", "PAL");
    assert_eq!(by_note.len(), 1);
    assert_eq!(by_note[0].title, "Shenmue");
  }

  #[test]
  fn counts_and_stats() {
    let state = sample();
    let counts = platform_counts(&state);
    assert_eq!(counts.all, 5);
    assert_eq!(counts.count_for("PS2"), 2);
    assert_eq!(counts.count_for("DS WII"), 1);
    assert_eq!(counts.count_for("PS4"), 0);

    let summary = platform_summary(&state);
    assert_eq!(summary[1], PlatformCount { platform: "PS2".to_string(), count: 2 });

    assert_eq!(
      stats(&state),
      Stats {
        collection_total: 5,
        wishlist_total: 3,
        in_transit: 1,
        platforms: 6,
      }
    );
  }
}

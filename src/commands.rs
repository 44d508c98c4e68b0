//! Intents issued by a view layer against canonical state.
//!
//! [`apply`] works on a copy of the state, so a rejected command leaves the
//! caller's snapshot untouched. Rows keep their ids; only their order is
//! restored after a mutation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::TrackerError;
use crate::model::{
  iso_timestamp, CollectionItem, ExportSnapshot, NewCollectionItem, NewWishlistItem,
  ReceiveOutcome, SeedSnapshot, TrackerState, WishlistItem, SCHEMA_VERSION,
};
use crate::normalize::{
  dedup_key, next_id, normalize_payload, normalize_state, received_to_collection, sort_collection,
  sort_wishlist,
};

#[derive(Clone, Debug)]
pub enum Command {
  AddCollectionItem(NewCollectionItem),
  AddWishlistItem(NewWishlistItem),
  RemoveCollectionItem { id: String },
  RemoveWishlistItem { id: String },
  SetInTransit { id: String, in_transit: bool },
  ReceiveItem { id: String },
  Import(Value),
  Export { exported_at: DateTime<Utc> },
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Outcome {
  Added { id: String },
  Removed { removed: bool },
  InTransitUpdated { updated: bool },
  Received(ReceiveOutcome),
  #[serde(rename_all = "camelCase")]
  Imported { collection_count: usize, wishlist_count: usize },
  Exported(ExportSnapshot),
}

impl Outcome {
  pub fn kind(&self) -> &'static str {
    match self {
      Outcome::Added { .. } => "add",
      Outcome::Removed { .. } => "remove",
      Outcome::InTransitUpdated { .. } => "in-transit update",
      Outcome::Received(_) => "receive",
      Outcome::Imported { .. } => "import",
      Outcome::Exported(_) => "export",
    }
  }
}

#[derive(Clone, Debug)]
pub struct Applied {
  pub state: TrackerState,
  pub outcome: Outcome,
}

impl Applied {
  /// Whether the new state differs from the one the command was applied to.
  pub fn changed(&self) -> bool {
    match &self.outcome {
      Outcome::Added { .. } | Outcome::Imported { .. } => true,
      Outcome::Removed { removed } => *removed,
      Outcome::InTransitUpdated { updated } => *updated,
      Outcome::Received(outcome) => outcome.moved || outcome.duplicate,
      Outcome::Exported(_) => false,
    }
  }
}

pub fn apply(state: &TrackerState, command: Command) -> Result<Applied, TrackerError> {
  let mut next = state.clone();
  let outcome = match command {
    Command::AddCollectionItem(input) => Outcome::Added {
      id: add_collection_item(&mut next, input)?,
    },
    Command::AddWishlistItem(input) => Outcome::Added {
      id: add_wishlist_item(&mut next, input)?,
    },
    Command::RemoveCollectionItem { id } => Outcome::Removed {
      removed: remove_collection_item(&mut next, &id),
    },
    Command::RemoveWishlistItem { id } => Outcome::Removed {
      removed: remove_wishlist_item(&mut next, &id),
    },
    Command::SetInTransit { id, in_transit } => Outcome::InTransitUpdated {
      updated: set_in_transit(&mut next, &id, in_transit),
    },
    Command::ReceiveItem { id } => Outcome::Received(receive(&mut next, &id)),
    Command::Import(payload) => {
      next = normalize_payload(&payload)?;
      Outcome::Imported {
        collection_count: next.collection.len(),
        wishlist_count: next.wishlist.len(),
      }
    }
    Command::Export { exported_at } => Outcome::Exported(export_snapshot(&next, exported_at)?),
  };
  sort_collection(&mut next.collection);
  sort_wishlist(&mut next.wishlist);

  Ok(Applied {
    state: next,
    outcome,
  })
}

fn required(platform: &str, title: &str) -> Result<(String, String), TrackerError> {
  let platform = platform.trim();
  let title = title.trim();
  if platform.is_empty() || title.is_empty() {
    return Err(TrackerError::ValidationFailed(
      "Platform and title are required.".to_string(),
    ));
  }
  Ok((platform.to_string(), title.to_string()))
}

pub fn add_collection_item(
  state: &mut TrackerState,
  input: NewCollectionItem,
) -> Result<String, TrackerError> {
  let (platform, title) = required(&input.platform, &input.title)?;
  let key = dedup_key(&platform, &title);
  if state
    .collection
    .iter()
    .any(|item| dedup_key(&item.platform, &item.title) == key)
  {
    return Err(TrackerError::DuplicateEntry {
      list: "collection",
      platform,
      title,
    });
  }

  let id = next_id("c", state.collection.iter().map(|item| item.id.as_str()));
  state.collection.push(CollectionItem {
    id: id.clone(),
    platform,
    title,
    version: input.version.trim().to_string(),
    cd_condition: input.cd_condition.trim().to_string(),
    manual_condition: input.manual_condition.trim().to_string(),
    price: input.price.trim().to_string(),
    extra: input.extra.trim().to_string(),
    note: input.note.trim().to_string(),
  });
  Ok(id)
}

pub fn add_wishlist_item(
  state: &mut TrackerState,
  input: NewWishlistItem,
) -> Result<String, TrackerError> {
  let (platform, title) = required(&input.platform, &input.title)?;
  let key = dedup_key(&platform, &title);
  if state
    .wishlist
    .iter()
    .any(|item| dedup_key(&item.platform, &item.title) == key)
  {
    return Err(TrackerError::DuplicateEntry {
      list: "wishlist",
      platform,
      title,
    });
  }

  let id = next_id("w", state.wishlist.iter().map(|item| item.id.as_str()));
  state.wishlist.push(WishlistItem {
    id: id.clone(),
    platform,
    title,
    note: input.note.trim().to_string(),
    in_transit: input.in_transit,
    received: false,
  });
  Ok(id)
}

pub fn remove_collection_item(state: &mut TrackerState, id: &str) -> bool {
  let before = state.collection.len();
  state.collection.retain(|item| item.id != id);
  state.collection.len() != before
}

pub fn remove_wishlist_item(state: &mut TrackerState, id: &str) -> bool {
  let before = state.wishlist.len();
  state.wishlist.retain(|item| item.id != id);
  state.wishlist.len() != before
}

pub fn set_in_transit(state: &mut TrackerState, id: &str, in_transit: bool) -> bool {
  match state.wishlist.iter_mut().find(|item| item.id == id) {
    Some(item) => {
      item.in_transit = in_transit;
      true
    }
    None => false,
  }
}

/// Moves a wishlist entry into the collection.
///
/// Unknown ids are a no-op. When the collection already holds the same
/// platform/title pair, the wishlist row is dropped and `duplicate` is set.
pub fn receive(state: &mut TrackerState, wishlist_id: &str) -> ReceiveOutcome {
  let Some(position) = state.wishlist.iter().position(|item| item.id == wishlist_id) else {
    return ReceiveOutcome::default();
  };
  let wish = state.wishlist.remove(position);

  let key = dedup_key(&wish.platform, &wish.title);
  if state
    .collection
    .iter()
    .any(|item| dedup_key(&item.platform, &item.title) == key)
  {
    return ReceiveOutcome {
      moved: false,
      duplicate: true,
    };
  }

  let mut item = received_to_collection(&wish);
  item.id = next_id("c", state.collection.iter().map(|row| row.id.as_str()));
  state.collection.push(item);
  ReceiveOutcome {
    moved: true,
    duplicate: false,
  }
}

pub fn export_snapshot(
  state: &TrackerState,
  exported_at: DateTime<Utc>,
) -> Result<ExportSnapshot, TrackerError> {
  let canonical = normalize_state(state)?;
  Ok(ExportSnapshot {
    schema_version: SCHEMA_VERSION,
    exported_at: iso_timestamp(exported_at),
    collection: canonical.collection,
    wishlist: canonical.wishlist,
  })
}

pub fn seed_snapshot(
  state: &TrackerState,
  generated_at: DateTime<Utc>,
) -> Result<SeedSnapshot, TrackerError> {
  let canonical = normalize_state(state)?;
  Ok(SeedSnapshot {
    generated_at: iso_timestamp(generated_at),
    collection: canonical.collection,
    wishlist: canonical.wishlist,
  })
}

/// `game-collection-2026-02-09T12-00-00.000Z.json`
pub fn export_file_name(exported_at: DateTime<Utc>) -> String {
  format!(
    "game-collection-{}.json",
    iso_timestamp(exported_at).replace(':', "-")
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use serde_json::json;

  fn okami_wish() -> WishlistItem {
    WishlistItem {
      id: "w1".to_string(),
      platform: "PS2".to_string(),
      title: "Okami".to_string(),
      note: String::new(),
      in_transit: true,
      received: false,
    }
  }

  fn new_collection(platform: &str, title: &str) -> NewCollectionItem {
    NewCollectionItem {
      platform: platform.to_string(),
      title: title.to_string(),
      ..NewCollectionItem::default()
    }
  }

  #[test]
  fn basic_receive_moves_row() {
    let mut state = TrackerState {
      collection: vec![],
      wishlist: vec![okami_wish()],
    };

    let outcome = receive(&mut state, "w1");
    assert_eq!(
      outcome,
      ReceiveOutcome {
        moved: true,
        duplicate: false
      }
    );
    assert!(state.wishlist.is_empty());
    assert_eq!(
      state.collection,
      vec![CollectionItem {
        id: "c1".to_string(),
        platform: "PS2".to_string(),
        title: "Okami".to_string(),
        ..CollectionItem::default()
      }]
    );
  }

  #[test]
  fn receive_duplicate_drops_wishlist_row() {
    let mut state = TrackerState {
      collection: vec![CollectionItem {
        id: "c1".to_string(),
        platform: "ps2".to_string(),
        title: "OKAMI".to_string(),
        ..CollectionItem::default()
      }],
      wishlist: vec![okami_wish()],
    };

    let outcome = receive(&mut state, "w1");
    assert!(outcome.duplicate);
    assert!(!outcome.moved);
    assert!(state.wishlist.is_empty());
    assert_eq!(state.collection.len(), 1);
  }

  #[test]
  fn receive_unknown_id_is_noop() {
    let mut state = TrackerState {
      collection: vec![],
      wishlist: vec![okami_wish()],
    };
    let applied = apply(&state, Command::ReceiveItem { id: "w9".to_string() }).unwrap();
    assert!(!applied.changed());
    assert_eq!(applied.state, state);
    assert_eq!(receive(&mut state, "w9"), ReceiveOutcome::default());
  }

  #[test]
  fn receive_numbers_above_gaps() {
    let mut state = TrackerState {
      collection: vec![
        CollectionItem {
          id: "c2".to_string(),
          platform: "PS1".to_string(),
          title: "Crash".to_string(),
          ..CollectionItem::default()
        },
        CollectionItem {
          id: "c7".to_string(),
          platform: "PS1".to_string(),
          title: "Spyro".to_string(),
          ..CollectionItem::default()
        },
      ],
      wishlist: vec![okami_wish()],
    };
    receive(&mut state, "w1");
    assert_eq!(state.collection[2].id, "c8");
  }

  #[test]
  fn add_rejects_blank_and_duplicate_without_mutation() {
    let mut state = TrackerState::default();
    add_collection_item(&mut state, new_collection("PS2", "Okami")).unwrap();

    let blank = apply(&state, Command::AddCollectionItem(new_collection("PS2", "   ")));
    assert!(matches!(blank, Err(TrackerError::ValidationFailed(_))));

    let duplicate = apply(&state, Command::AddCollectionItem(new_collection("ps-2", " okami")));
    let error = duplicate.unwrap_err();
    assert!(matches!(error, TrackerError::DuplicateEntry { .. }));
    assert!(error.is_rejection());
    assert_eq!(state.collection.len(), 1);
  }

  #[test]
  fn add_ids_stay_above_existing_maximum() {
    let mut gapped = TrackerState::default();
    for title in ["A", "B", "C"] {
      add_collection_item(&mut gapped, new_collection("PS1", title)).unwrap();
    }
    assert!(remove_collection_item(&mut gapped, "c2"));
    let id = add_collection_item(&mut gapped, new_collection("PS1", "D")).unwrap();
    assert_eq!(id, "c4");
  }

  #[test]
  fn wishlist_add_toggle_and_remove() {
    let state = TrackerState::default();
    let applied = apply(
      &state,
      Command::AddWishlistItem(NewWishlistItem {
        platform: " PS2 ".to_string(),
        title: "Rez".to_string(),
        note: " import ".to_string(),
        in_transit: false,
      }),
    )
    .unwrap();
    assert_eq!(applied.outcome, Outcome::Added { id: "w1".to_string() });
    assert_eq!(applied.state.wishlist[0].platform, "PS2");
    assert_eq!(applied.state.wishlist[0].note, "import");

    let toggled = apply(
      &applied.state,
      Command::SetInTransit {
        id: "w1".to_string(),
        in_transit: true,
      },
    )
    .unwrap();
    assert!(toggled.changed());
    assert!(toggled.state.wishlist[0].in_transit);

    let removed = apply(&toggled.state, Command::RemoveWishlistItem { id: "w1".to_string() }).unwrap();
    assert_eq!(removed.outcome, Outcome::Removed { removed: true });
    assert!(removed.state.wishlist.is_empty());
  }

  #[test]
  fn malformed_import_leaves_state_untouched() {
    let mut state = TrackerState::default();
    add_collection_item(&mut state, new_collection("PS2", "Okami")).unwrap();

    let result = apply(&state, Command::Import(json!("not an object")));
    assert!(matches!(result, Err(TrackerError::InvalidFormat(_))));
    assert_eq!(state.collection.len(), 1);
  }

  #[test]
  fn import_replaces_both_lists() {
    let mut state = TrackerState::default();
    add_collection_item(&mut state, new_collection("PS2", "Okami")).unwrap();

    let applied = apply(
      &state,
      Command::Import(json!({
        "collection": [{ "platform": "PS1", "title": "Crash" }],
        "wishlist": [{ "platform": "PS4", "title": "Bloodborne" }]
      })),
    )
    .unwrap();
    assert_eq!(
      applied.outcome,
      Outcome::Imported {
        collection_count: 1,
        wishlist_count: 1
      }
    );
    assert_eq!(applied.state.collection[0].title, "Crash");
  }

  #[test]
  fn export_is_renormalized_and_tagged() {
    let mut state = TrackerState::default();
    add_collection_item(&mut state, new_collection("PS2", "Okami")).unwrap();
    add_collection_item(&mut state, new_collection("PS1", "Crash")).unwrap();
    let at = Utc.with_ymd_and_hms(2026, 2, 9, 12, 0, 0).unwrap();

    let applied = apply(&state, Command::Export { exported_at: at }).unwrap();
    assert!(!applied.changed());
    let Outcome::Exported(snapshot) = applied.outcome else {
      panic!("expected export outcome");
    };
    assert_eq!(snapshot.schema_version, 1);
    assert_eq!(snapshot.exported_at, "2026-02-09T12:00:00.000Z");
    assert_eq!(snapshot.collection[0].title, "Crash");
    assert_eq!(snapshot.collection[0].id, "c1");

    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(value["schemaVersion"], json!(1));
    assert!(value["collection"][0].get("cdCondition").is_some());

    assert_eq!(export_file_name(at), "game-collection-2026-02-09T12-00-00.000Z.json");
  }
}

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use serde_json::json;

use crate::commands::{export_file_name, seed_snapshot, Command, Outcome};
use crate::error::TrackerError;
use crate::model::{NewCollectionItem, NewWishlistItem};
use crate::query::{self, PlatformFilter};
use crate::store;
use crate::{AppConfig, Tracker};

#[derive(Parser)]
#[command(name = "gamecollection")]
#[command(about = "Track a game collection and wishlist")]
pub struct Cli {
  /// Directory holding the state database
  #[arg(long, env = "GAMECOLLECTION_DATA_DIR", global = true)]
  data_dir: Option<PathBuf>,

  /// Seed file path or http(s) URL, read only when nothing is persisted yet
  #[arg(long, env = "GAMECOLLECTION_SEED", global = true)]
  seed: Option<String>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// List collection rows
  List {
    /// Platform name, or "all"
    #[arg(long, default_value = "all")]
    platform: String,
    #[arg(long, short, default_value = "")]
    query: String,
  },

  /// List wishlist rows
  Wishlist {
    /// Exact platform name; empty lists every platform
    #[arg(long, default_value = "")]
    platform: String,
    #[arg(long, short, default_value = "")]
    query: String,
  },

  /// Platform catalog with collection counts
  Platforms,

  Stats,

  /// Add a game to the collection
  Add {
    #[arg(long)]
    platform: String,
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    version: String,
    #[arg(long, default_value = "")]
    cd_condition: String,
    #[arg(long, default_value = "")]
    manual_condition: String,
    #[arg(long, default_value = "")]
    price: String,
    #[arg(long, default_value = "")]
    extra: String,
    #[arg(long, default_value = "")]
    note: String,
  },

  /// Add a game to the wishlist
  Wish {
    #[arg(long)]
    platform: String,
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    note: String,
    #[arg(long)]
    in_transit: bool,
  },

  /// Remove a collection row by id
  Remove { id: String },

  /// Remove a wishlist row by id
  Unwish { id: String },

  /// Mark a wishlist row as in transit (or clear it with --off)
  Transit {
    id: String,
    #[arg(long)]
    off: bool,
  },

  /// Move a wishlist row into the collection
  Receive { id: String },

  /// Replace both lists with the contents of a JSON file
  Import {
    path: PathBuf,
    /// Skip the backup of the current state
    #[arg(long)]
    no_backup: bool,
  },

  /// Write a timestamped export snapshot
  Export {
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
  },

  /// Write the current state as seed data
  WriteSeed {
    #[arg(default_value = "data/seed.json")]
    path: PathBuf,
  },

  /// List backups taken before imports
  Backups,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), TrackerError> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn execute(cli: Cli) -> Result<(), TrackerError> {
  let config = AppConfig::resolve(cli.data_dir, cli.seed.as_deref());
  let (mut tracker, report) = Tracker::open(&config)?;
  if let Some(warning) = &report.warning {
    eprintln!("warning: {}", warning);
  }

  match cli.command {
    Commands::List { platform, query } => {
      let rows = query::filter_collection(tracker.state(), &PlatformFilter::parse(&platform), &query);
      print_json(&rows)
    }
    Commands::Wishlist { platform, query } => {
      print_json(&query::filter_wishlist(tracker.state(), &platform, &query))
    }
    Commands::Platforms => {
      let counts = query::platform_counts(tracker.state());
      print_json(&json!({
        "all": counts.all,
        "platforms": query::platform_summary(tracker.state()),
      }))
    }
    Commands::Stats => print_json(&query::stats(tracker.state())),
    Commands::Add {
      platform,
      title,
      version,
      cd_condition,
      manual_condition,
      price,
      extra,
      note,
    } => {
      let outcome = tracker.dispatch(Command::AddCollectionItem(NewCollectionItem {
        platform,
        title,
        version,
        cd_condition,
        manual_condition,
        price,
        extra,
        note,
      }))?;
      print_json(&outcome)
    }
    Commands::Wish {
      platform,
      title,
      note,
      in_transit,
    } => {
      let outcome = tracker.dispatch(Command::AddWishlistItem(NewWishlistItem {
        platform,
        title,
        note,
        in_transit,
      }))?;
      print_json(&outcome)
    }
    Commands::Remove { id } => print_json(&tracker.dispatch(Command::RemoveCollectionItem { id })?),
    Commands::Unwish { id } => print_json(&tracker.dispatch(Command::RemoveWishlistItem { id })?),
    Commands::Transit { id, off } => print_json(&tracker.dispatch(Command::SetInTransit {
      id,
      in_transit: !off,
    })?),
    Commands::Receive { id } => print_json(&tracker.dispatch(Command::ReceiveItem { id })?),
    Commands::Import { path, no_backup } => {
      let payload = store::read_json_file(&path)?;
      tracker.set_backup_on_import(!no_backup);
      let outcome = tracker.dispatch(Command::Import(payload))?;
      info!("imported {}", path.display());
      print_json(&outcome)
    }
    Commands::Export { out_dir } => {
      let now = Utc::now();
      let Outcome::Exported(snapshot) = tracker.dispatch(Command::Export { exported_at: now })? else {
        return Ok(());
      };
      let path = out_dir.join(export_file_name(now));
      store::write_json_file(&path, &snapshot)?;
      info!("exported {}", path.display());
      print_json(&json!({
        "path": path.display().to_string(),
        "collection": snapshot.collection.len(),
        "wishlist": snapshot.wishlist.len(),
      }))
    }
    Commands::WriteSeed { path } => {
      let snapshot = seed_snapshot(tracker.state(), Utc::now())?;
      store::write_json_file(&path, &snapshot)?;
      info!("wrote seed {}", path.display());
      print_json(&json!({
        "path": path.display().to_string(),
        "collection": snapshot.collection.len(),
        "wishlist": snapshot.wishlist.len(),
      }))
    }
    Commands::Backups => print_json(&tracker.backups()?),
  }
}

pub fn run() -> ExitCode {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let cli = Cli::parse();
  match execute(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(error) => {
      eprintln!("error: {}", error);
      ExitCode::FAILURE
    }
  }
}

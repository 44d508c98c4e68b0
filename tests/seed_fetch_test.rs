use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use gamecollection_lib::store::{LoadSource, SeedSource};
use gamecollection_lib::{AppConfig, Tracker};

/// Answers a single HTTP request with the given status line and body.
fn serve_once(status_line: &'static str, body: &'static str) -> String {
  let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
  let addr = listener.local_addr().expect("local addr");
  thread::spawn(move || {
    if let Ok((mut stream, _)) = listener.accept() {
      let mut request = [0_u8; 4096];
      let _ = stream.read(&mut request);
      let response = format!(
        "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
      );
      let _ = stream.write_all(response.as_bytes());
      let _ = stream.flush();
    }
  });
  format!("http://{addr}/seed.json")
}

fn open_with_seed(url: &str) -> (tempfile::TempDir, Tracker, gamecollection_lib::store::LoadReport) {
  // Loopback requests must not be routed through an ambient proxy.
  std::env::set_var("NO_PROXY", "127.0.0.1");
  let dir = tempfile::tempdir().expect("tempdir");
  let mut config = AppConfig::in_dir(dir.path());
  config.seed = Some(SeedSource::parse(url));
  let (tracker, report) = Tracker::open(&config).expect("open");
  (dir, tracker, report)
}

#[test]
fn seed_fetch_error_status_degrades_to_empty_with_warning() {
  let url = serve_once("HTTP/1.1 404 Not Found", "{}");
  let (_dir, tracker, report) = open_with_seed(&url);

  assert_eq!(report.source, LoadSource::Empty);
  let warning = report.warning.expect("warning");
  assert!(warning.contains("404"), "unexpected warning: {warning}");
  assert!(tracker.state().collection.is_empty());
  assert!(tracker.state().wishlist.is_empty());
}

#[test]
fn seed_fetch_success_loads_and_normalizes() {
  let url = serve_once(
    "HTTP/1.1 200 OK",
    r#"{"collection":[{"platform":"PS2","title":"Ico"}],"wishlist":[{"platform":"PS2","title":"Okami","inTransit":"yes"}]}"#,
  );
  let (_dir, tracker, report) = open_with_seed(&url);

  assert_eq!(report.source, LoadSource::Seed);
  assert!(report.warning.is_none());
  assert_eq!(tracker.state().collection[0].id, "c1");
  assert_eq!(tracker.state().collection[0].title, "Ico");
  assert!(tracker.state().wishlist[0].in_transit);
}

//! A station loaded from a config file, receiving results from a peer.

use racelink::{Config, PeerRole, ResultKind, Station};
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .unwrap()
}

#[test]
fn test_station_applies_results_from_peers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("racelink.toml");
    let port = free_port();

    let mut config = Config::default();
    config.card_reader.port = Some("/nonexistent/ttyLZFOX".to_string());
    config.card_reader.engine.startup_delay_ms = 0;
    config.card_reader.engine.pop_timeout_ms = 50;
    config.teamwork.role = PeerRole::Server;
    config.teamwork.host = "127.0.0.1".to_string();
    config.teamwork.port = port;
    config.teamwork.engine.pop_timeout_ms = 50;
    config.save_to_file(&path).unwrap();

    let config = Config::load_from_file(&path).unwrap();
    let mut station = Station::new(&config);
    station.start().unwrap();
    station.pump(Duration::from_millis(300));

    // the card reader cannot open its port; teamwork keeps the station up
    assert!(!station.card_reader().is_alive());
    assert!(station.teamwork().is_alive());

    let mut peer = TcpStream::connect(("127.0.0.1", port)).unwrap();
    let frame = concat!(
        r#"{"station":"6f1c1a52-0d4e-4c1e-9a57-3f7f3c6a9b10","kind":"result_add","#,
        r#""payload":{"kind":"lz_fox","card_number":321,"start_time":null,"#,
        r#""finish_time":"10:42:05","splits":[]}}"#,
        "\n"
    );
    peer.write_all(frame.as_bytes()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while station.race().results().is_empty() && Instant::now() < deadline {
        station.pump(Duration::from_millis(50));
    }

    let results = station.race().results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].kind, ResultKind::LzFox);
    assert_eq!(results[0].card_number, 321);

    assert!(station.shutdown(Duration::from_secs(3)));
}

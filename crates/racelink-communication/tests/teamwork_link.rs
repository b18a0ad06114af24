//! Teamwork roles and supervisors over loopback TCP.

use racelink_communication::{PeerLink, Teamwork, TeamworkClient, TeamworkServer};
use racelink_core::{Command, UiLoop};
use racelink_settings::{PeerRole, TeamworkSettings};
use serde_json::json;
use std::net::TcpListener;
use std::time::{Duration, Instant};
use uuid::Uuid;

const READ_TIMEOUT: Duration = Duration::from_millis(20);

fn client_of(server: &TeamworkServer) -> TeamworkClient {
    TeamworkClient::connect(
        "127.0.0.1",
        server.local_addr().port(),
        Uuid::new_v4(),
        Duration::from_secs(2),
        READ_TIMEOUT,
    )
    .unwrap()
}

/// Poll `link` until it yields a command or five seconds pass
fn receive(link: &mut dyn PeerLink, pump: &mut dyn FnMut()) -> Option<Command> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        pump();
        if let Some(command) = link.receive_one().unwrap() {
            return Some(command);
        }
    }
    None
}

#[test]
fn test_client_and_server_exchange_commands() {
    let mut server = TeamworkServer::bind("127.0.0.1", 0, Uuid::new_v4(), READ_TIMEOUT).unwrap();
    let mut client = client_of(&server);

    let hello = Command::new("result_update", json!({"bib": 101}));
    client.send(&hello).unwrap();
    assert_eq!(receive(&mut server, &mut || {}), Some(hello));
    assert_eq!(server.peer_count(), 1);

    let reply = Command::new("person_update", json!({"name": "Kim"}));
    server.send(&reply).unwrap();
    assert_eq!(receive(&mut client, &mut || {}), Some(reply));

    client.disconnect();
    server.disconnect();
}

#[test]
fn test_server_relays_between_clients() {
    let mut server = TeamworkServer::bind("127.0.0.1", 0, Uuid::new_v4(), READ_TIMEOUT).unwrap();
    let mut first = client_of(&server);
    let mut second = client_of(&server);

    let deadline = Instant::now() + Duration::from_secs(5);
    while server.peer_count() < 2 && Instant::now() < deadline {
        server.receive_one().unwrap();
    }
    assert_eq!(server.peer_count(), 2);

    let command = Command::new("course_update", json!({"controls": [31, 32]}));
    first.send(&command).unwrap();

    let relayed = receive(&mut second, &mut || {
        let _ = server.receive_one();
    });
    assert_eq!(relayed, Some(command));
}

#[test]
fn test_malformed_frames_are_skipped() {
    use std::io::Write;

    let mut server = TeamworkServer::bind("127.0.0.1", 0, Uuid::new_v4(), READ_TIMEOUT).unwrap();
    let mut raw = std::net::TcpStream::connect(server.local_addr()).unwrap();
    let frame = format!(
        "not json\n{{\"station\":\"{}\",\"kind\":\"ping\",\"payload\":1}}\n",
        Uuid::new_v4()
    );
    raw.write_all(frame.as_bytes()).unwrap();

    assert_eq!(receive(&mut server, &mut || {}), Some(Command::new("ping", json!(1))));
}

#[test]
fn test_client_sees_server_close_as_connection_lost() {
    let mut server = TeamworkServer::bind("127.0.0.1", 0, Uuid::new_v4(), READ_TIMEOUT).unwrap();
    let mut client = client_of(&server);

    let deadline = Instant::now() + Duration::from_secs(5);
    while server.peer_count() < 1 && Instant::now() < deadline {
        server.receive_one().unwrap();
    }
    server.disconnect();

    let deadline = Instant::now() + Duration::from_secs(5);
    let err = loop {
        match client.receive_one() {
            Err(e) => break e,
            Ok(_) => assert!(Instant::now() < deadline, "client never noticed the close"),
        }
    };
    assert!(err.is_connection_error());
}

#[test]
fn test_connect_refused() {
    let port = free_port();
    let result = TeamworkClient::connect(
        "127.0.0.1",
        port,
        Uuid::new_v4(),
        Duration::from_millis(500),
        READ_TIMEOUT,
    );
    assert!(result.is_err());
}

#[test]
fn test_send_on_dead_link_is_dropped_without_blocking() {
    let (mut ui_loop, ui) = UiLoop::<Vec<Command>>::new(4);
    let teamwork = Teamwork::new(TeamworkSettings::default(), ui);
    assert!(!teamwork.is_alive());

    let started = Instant::now();
    for n in 0..1000 {
        teamwork.send(Command::new("result_update", json!(n)));
    }
    assert!(started.elapsed() < Duration::from_secs(1));

    let mut seen = Vec::new();
    assert_eq!(ui_loop.run_pending(&mut seen), 0);
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .unwrap()
}

fn fast_settings(role: PeerRole, port: u16) -> TeamworkSettings {
    let mut settings = TeamworkSettings {
        host: "127.0.0.1".to_string(),
        port,
        role,
        read_timeout_ms: 20,
        ..TeamworkSettings::default()
    };
    settings.engine.poll_interval_ms = 1;
    settings.engine.pop_timeout_ms = 20;
    settings
}

#[test]
fn test_supervisors_replicate_commands() {
    let port = free_port();

    let (mut server_ui, ui) = UiLoop::<Vec<Command>>::new(16);
    let mut server = Teamwork::new(fast_settings(PeerRole::Server, port), ui);
    server.register_callback(|seen: &mut Vec<Command>, command| seen.push(command));
    server.start().unwrap();
    std::thread::sleep(Duration::from_millis(200));
    assert!(server.is_alive());

    let (mut client_ui, ui) = UiLoop::<Vec<Command>>::new(16);
    let mut client = Teamwork::new(TeamworkSettings::default(), ui);
    client.set_options("127.0.0.1", port, PeerRole::Client);
    client.register_callback(|seen: &mut Vec<Command>, command| seen.push(command));
    client.start().unwrap();
    std::thread::sleep(Duration::from_millis(200));
    assert!(client.is_alive());

    let command = Command::new("result_update", json!({"bib": 7, "status": "ok"}));
    client.send(command.clone());

    let mut on_server = Vec::new();
    assert!(server_ui.run_until(&mut on_server, Duration::from_secs(5), |s| !s.is_empty()));
    assert_eq!(on_server, vec![command]);

    // local sends are not echoed back to the sender
    let mut on_client = Vec::new();
    client_ui.run_for(&mut on_client, Duration::from_millis(100));
    assert!(on_client.is_empty());

    client.stop();
    server.stop();
    assert!(client.wait_finished(Duration::from_secs(2)));
    assert!(server.wait_finished(Duration::from_secs(2)));
    assert!(!client.is_alive());
    assert!(!server.is_alive());
}

#[test]
fn test_client_start_without_server_is_not_alive() {
    let (_ui_loop, ui) = UiLoop::<Vec<Command>>::new(4);
    let mut client = Teamwork::new(fast_settings(PeerRole::Client, free_port()), ui);
    client.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(3);
    while client.is_alive() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(!client.is_alive());
    client.stop();
}

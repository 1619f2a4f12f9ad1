//! End-to-end tests over real sockets: the HTTP listener and the WebSocket
//! channel listener.

use std::io::{Read as _, Write as _};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wharf::config::AppConfig;
use wharf::http::ResponsePayload;
use wharf::router::{Controller, HandlerEntry, RouteAnnotation};
use wharf::server::{Server, ServerOptions};
use wharf::websocket::{Channel, ChannelBroadcaster, Subscription};

fn test_config(port: u16, ws_port: u16) -> AppConfig {
    let mut config = AppConfig {
        host: "127.0.0.1".to_string(),
        port,
        is_production: true,
        static_files_directory: std::env::temp_dir().join("wharf-no-static"),
        ..AppConfig::default()
    };
    config.web_socket.port = ws_port;
    config
}

struct Greeter;

impl Controller for Greeter {
    fn name(&self) -> &'static str {
        "Greeter"
    }

    fn handlers(&self) -> Vec<HandlerEntry> {
        vec![HandlerEntry::action("index", RouteAnnotation::get("/"), |_, _| {
            Ok(ResponsePayload::from("Hello from wharf!"))
        })]
    }
}

#[test]
fn serves_http_end_to_end() -> anyhow::Result<()> {
    let server = Server::new(ServerOptions {
        config: test_config(19431, 19432),
        controllers: vec![Arc::new(Greeter)],
        ..ServerOptions::default()
    })?;
    let running = server.start()?;
    running.wait_ready()?;

    let mut stream = TcpStream::connect("127.0.0.1:19431")?;
    stream.set_read_timeout(Some(Duration::from_secs(3)))?;
    stream.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")?;

    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if String::from_utf8_lossy(&buf).contains("Hello from wharf!") {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    let text = String::from_utf8_lossy(&buf);
    assert!(text.starts_with("HTTP/1.1 200"), "{text}");
    assert!(text.contains("Hello from wharf!"));
    assert!(text.to_lowercase().contains("x-content-type-options"));

    running.stop();
    Ok(())
}

struct EchoRooms {
    broadcaster: ChannelBroadcaster,
}

impl Channel for EchoRooms {
    fn name(&self) -> &str {
        "rooms/:id"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        let broadcaster = self.broadcaster.clone();
        vec![Subscription::new("message", move |payload| {
            broadcaster.broadcast(&json!({ "echo": payload }), Some("rooms/1"));
        })]
    }
}

#[test]
fn channels_round_trip_over_websocket() {
    let server = Server::new(ServerOptions {
        config: test_config(19441, 19442),
        ..ServerOptions::default()
    })
    .expect("server");
    let broadcaster = server.broadcaster();
    broadcaster
        .register(Arc::new(EchoRooms {
            broadcaster: broadcaster.clone(),
        }))
        .expect("register");
    let running = server.start().expect("start");
    running.wait_ready().expect("ready");

    let mut socket = None;
    for _ in 0..50 {
        match tungstenite::connect("ws://127.0.0.1:19442") {
            Ok((ws, _response)) => {
                socket = Some(ws);
                break;
            }
            Err(_) => std::thread::sleep(Duration::from_millis(20)),
        }
    }
    let mut socket = socket.expect("websocket connect");
    if let tungstenite::stream::MaybeTlsStream::Plain(stream) = socket.get_ref() {
        stream
            .set_read_timeout(Some(Duration::from_secs(3)))
            .expect("timeout");
    }

    socket
        .send(tungstenite::Message::text(
            r#"{"channel":"rooms/1","payload":{"ping":1}}"#,
        ))
        .expect("send");

    let frame = loop {
        match socket.read() {
            Ok(tungstenite::Message::Text(text)) => break text.to_string(),
            Ok(_) => continue,
            Err(e) => panic!("no echo received: {e}"),
        }
    };
    let envelope: serde_json::Value = serde_json::from_str(&frame).expect("envelope");
    assert_eq!(envelope["channel"], "rooms/1");
    assert_eq!(envelope["payload"]["echo"]["ping"], 1);

    running.stop();
}

#[test]
fn duplicate_ports_fail_validation() {
    let mut config = test_config(19451, 19451);
    config.web_socket.enabled = true;
    let err = Server::new(ServerOptions {
        config,
        ..ServerOptions::default()
    })
    .expect_err("must fail");
    assert!(err.to_string().contains("port"));
}

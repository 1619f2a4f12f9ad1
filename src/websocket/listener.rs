//! WebSocket transport: a `may` accept loop feeding the broadcaster.
//!
//! Each accepted connection runs in its own coroutine with a short read
//! timeout, alternating between reading inbound frames and draining the
//! connection's outbox; broadcasts never touch the socket directly, so
//! delivery cannot contend with the blocking read.

use std::io;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use may::coroutine::JoinHandle;
use may::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use tungstenite::{accept, Error as WsError, Message};

use crate::config::AppConfig;
use crate::ids::ConnectionId;
use crate::websocket::{ChannelBroadcaster, ConnectionHandle, ConnectionInfo};

const OUTBOX_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Bind the channel listener and start accepting connections.
pub fn start(
    config: Arc<AppConfig>,
    broadcaster: ChannelBroadcaster,
) -> io::Result<JoinHandle<()>> {
    let addr = format!("{}:{}", config.host, config.web_socket.port);
    let listener = TcpListener::bind(&addr)?;
    info!(addr = %addr, "WebSocket server is running");

    let log_connections = config.logger.web_socket_connections;
    let handle = may::go!(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let broadcaster = broadcaster.clone();
                    may::go!(move || serve_connection(stream, broadcaster, log_connections));
                }
                Err(e) => debug!(error = %e, "accept failed"),
            }
        }
    });
    Ok(handle)
}

fn serve_connection(stream: TcpStream, broadcaster: ChannelBroadcaster, log_connections: bool) {
    let remote_addr = stream.peer_addr().ok();
    let mut socket = match accept(stream) {
        Ok(socket) => socket,
        Err(e) => {
            debug!(error = %e, "websocket handshake failed");
            return;
        }
    };
    // Short read timeout so the loop can drain the outbox between frames.
    if let Err(e) = socket
        .get_ref()
        .set_read_timeout(Some(OUTBOX_POLL_INTERVAL))
    {
        warn!(error = %e, "cannot set read timeout; closing connection");
        return;
    }

    let info = ConnectionInfo {
        id: ConnectionId::new(),
        remote_addr,
    };
    let (outbox, inbox) = std::sync::mpsc::channel::<String>();
    broadcaster.attach(ConnectionHandle::new(info.clone(), outbox));
    if log_connections {
        info!(connection = %info.id, remote_addr = ?remote_addr, "WebSocket connected");
    }

    'connection: loop {
        match socket.read() {
            Ok(Message::Text(text)) => broadcaster.dispatch(&info, text.as_str()),
            Ok(Message::Ping(payload)) => {
                if socket.send(Message::Pong(payload)).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(WsError::Io(e)) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
            Err(e) => {
                debug!(connection = %info.id, error = %e, "websocket read failed");
                break;
            }
        }

        while let Ok(frame) = inbox.try_recv() {
            if socket.send(Message::text(frame)).is_err() {
                break 'connection;
            }
        }
    }

    broadcaster.detach(info.id);
    if log_connections {
        info!(connection = %info.id, "WebSocket disconnected");
    }
}

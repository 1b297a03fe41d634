//! HTTP + WebSocket transport on the ESP-IDF httpd.
//!
//! - `/websocket`: every session is a row in the [`ConnectionTable`];
//!   text frames are published as [`WsFrame`] payloads for the RPC task.
//! - everything else: GET/PUT/DELETE on the web root via [`WebRoot`].
//!
//! The radio controller starts the server when a role becomes usable and
//! stops it before any role change.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use esp_idf_svc::handle::RawHandle;
use esp_idf_svc::http::Method;
use esp_idf_svc::http::server::ws::{EspHttpWsConnection, EspHttpWsDetachedSender};
use esp_idf_svc::http::server::{Configuration, EspHttpServer};
use esp_idf_svc::io::{Read, Write};
use esp_idf_svc::sys::EspError;
use esp_idf_svc::ws::FrameType;
use log::{error, info, warn};

use crate::app::ports::Transport;
use crate::bus::{MessageBus, MessageType};
use crate::config::{MAX_CONNECTIONS, SystemConfig};
use crate::connection::{ConnectionId, ConnectionTable, Role, Socket};
use crate::rpc::WsFrame;
use crate::rpc::protocol::{self, INTERNAL_ERROR, INVALID_REQUEST, MAX_REQUEST_LEN};
use crate::web::{FileOutcome, WEB_PARTITION, WebRoot};

/// Where the FAT partition holding the web assets is mounted.
pub const WEB_ROOT: &str = "/spiflash";
const WS_URI: &str = "/websocket";
const CLOSE_GRACE: Duration = Duration::from_millis(100);
const CHUNK: usize = 1024;

type Senders = Arc<Mutex<HashMap<ConnectionId, EspHttpWsDetachedSender>>>;

pub struct HttpTransport {
    bus: Arc<MessageBus>,
    frames: MessageType,
    connections: Arc<ConnectionTable>,
    port: u16,
    server: Mutex<Option<(EspHttpServer<'static>, Role)>>,
    senders: Senders,
}

impl HttpTransport {
    pub fn new(
        bus: Arc<MessageBus>,
        frames: MessageType,
        connections: Arc<ConnectionTable>,
        config: &SystemConfig,
    ) -> Self {
        Self {
            bus,
            frames,
            connections,
            port: config.http_port,
            server: Mutex::new(None),
            senders: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn launch(&self, role: Role) -> Result<EspHttpServer<'static>, EspError> {
        let conf = Configuration {
            http_port: self.port,
            max_open_sockets: MAX_CONNECTIONS,
            uri_match_wildcard: true,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&conf)?;
        self.register_ws(&mut server, role)?;
        register_files(&mut server)?;
        Ok(server)
    }

    fn register_ws(&self, server: &mut EspHttpServer<'static>, role: Role) -> Result<(), EspError> {
        let bus = Arc::clone(&self.bus);
        let frames = self.frames;
        let connections = Arc::clone(&self.connections);
        let senders = Arc::clone(&self.senders);
        server.ws_handler(WS_URI, move |ws: &mut EspHttpWsConnection| -> Result<(), EspError> {
            let socket: Socket = ws.session();
            if ws.is_new() {
                match connections.create(role, socket) {
                    Ok(id) => {
                        let sender = ws.create_detached_sender()?;
                        lock(&senders).insert(id, sender);
                    }
                    Err(e) => warn!("http: ws session {} refused: {}", socket, e),
                }
                return Ok(());
            }
            if ws.is_closed() {
                if let Ok(id) = connections.delete(socket) {
                    lock(&senders).remove(&id);
                }
                return Ok(());
            }
            // An empty buffer only reports the frame length.
            let (kind, len) = match ws.recv(&mut []) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("http: frame header from {} unreadable: {}", socket, e);
                    return reply_error(ws, INTERNAL_ERROR);
                }
            };
            if !matches!(kind, FrameType::Text(false)) {
                return Ok(());
            }
            if len > MAX_REQUEST_LEN {
                warn!("http: {} byte frame from {} rejected", len, socket);
                return reply_error(ws, INVALID_REQUEST);
            }
            let mut buf = vec![0u8; len];
            if let Err(e) = ws.recv(&mut buf) {
                warn!("http: frame from {} unreadable: {}", socket, e);
                return reply_error(ws, INTERNAL_ERROR);
            }
            let Some(connection) = connections.lookup_by_socket(socket) else {
                warn!("http: frame on unknown session {}", socket);
                return Ok(());
            };
            // Text frames are NUL-terminated by the server.
            let text = String::from_utf8_lossy(&buf[..len]).trim_end_matches('\0').to_owned();
            if let Err(e) = bus.send_payload(frames, WsFrame { connection, text }) {
                warn!("http: frame from {} dropped: {}", connection, e);
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// Answer a frame that never reached the engine.  The request id is unknown.
fn reply_error(ws: &mut EspHttpWsConnection, code: i32) -> Result<(), EspError> {
    let message = protocol::reserved_message(code).unwrap_or("");
    let text = protocol::failure(code, message, None);
    if let Err(e) = ws.send(FrameType::Text(false), text.as_bytes()) {
        warn!("http: error reply to {} failed: {}", ws.session(), e);
    }
    Ok(())
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn status_text(outcome: FileOutcome) -> &'static str {
    match outcome {
        FileOutcome::Served => "OK",
        FileOutcome::Created => "Created",
        FileOutcome::Replaced | FileOutcome::Deleted => "No Content",
        FileOutcome::NotFound => "Not Found",
        FileOutcome::Busy => "Service Unavailable",
        FileOutcome::StorageFull => "Insufficient Storage",
        FileOutcome::Failed => "Internal Server Error",
    }
}

fn register_files(server: &mut EspHttpServer<'static>) -> Result<(), EspError> {
    server.fn_handler("/*", Method::Get, |req| -> anyhow::Result<()> {
        let root = WebRoot::new(WEB_ROOT);
        match root.get(req.uri()) {
            Ok((body, content_type)) => {
                let mut resp = req.into_response(200, None, &[("Content-Type", content_type)])?;
                for chunk in body.chunks(CHUNK) {
                    resp.write_all(chunk)?;
                }
            }
            Err(outcome) => {
                req.into_status_response(outcome.status())?;
            }
        }
        Ok(())
    })?;

    server.fn_handler("/*", Method::Put, |mut req| -> anyhow::Result<()> {
        let uri = req.uri().to_owned();
        let mut body = Vec::new();
        let mut buf = [0u8; CHUNK];
        loop {
            match req.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => body.extend_from_slice(&buf[..n]),
                Err(e) => {
                    warn!("http: receive for {} failed: {:?}", uri, e);
                    req.into_response(500, Some(status_text(FileOutcome::Failed)), &[])?;
                    return Ok(());
                }
            }
        }
        let outcome = WebRoot::new(WEB_ROOT).put(&uri, &body);
        req.into_response(outcome.status(), Some(status_text(outcome)), &[])?;
        Ok(())
    })?;

    server.fn_handler("/*", Method::Delete, |req| -> anyhow::Result<()> {
        let outcome = WebRoot::new(WEB_ROOT).delete(req.uri());
        req.into_response(outcome.status(), Some(status_text(outcome)), &[])?;
        Ok(())
    })?;
    Ok(())
}

impl Transport for HttpTransport {
    fn start(&self, role: Role) {
        let mut server = lock(&self.server);
        if server.is_some() {
            return;
        }
        match self.launch(role) {
            Ok(s) => {
                info!("http: server up on port {} ({:?})", self.port, role);
                *server = Some((s, role));
            }
            Err(e) => error!("http: server start failed: {}", e),
        }
    }

    fn stop(&self) {
        let Some((server, role)) = lock(&self.server).take() else {
            return;
        };
        for sender in lock(&self.senders).values_mut() {
            let _ = sender.send(FrameType::Close, &[]);
        }
        std::thread::sleep(CLOSE_GRACE);
        drop(server);
        lock(&self.senders).clear();
        for socket in self.connections.sockets(role) {
            let _ = self.connections.delete(socket);
        }
        info!("http: server stopped");
    }

    fn close(&self, socket: Socket) {
        if let Some((server, _)) = lock(&self.server).as_ref() {
            // SAFETY: the handle is live while the server is held.
            unsafe {
                esp_idf_svc::sys::httpd_sess_trigger_close(server.handle(), socket);
            }
        }
    }

    fn send_text(&self, connection: ConnectionId, text: &str) {
        let mut senders = lock(&self.senders);
        let Some(sender) = senders.get_mut(&connection) else {
            warn!("http: no session for {}", connection);
            return;
        };
        if let Err(e) = sender.send(FrameType::Text(false), text.as_bytes()) {
            warn!("http: send to {} failed: {}", connection, e);
        }
    }
}

/// Mount the FAT partition labelled [`WEB_PARTITION`] at [`WEB_ROOT`].
pub fn mount_web_root() -> Result<(), EspError> {
    let conf = esp_idf_svc::sys::esp_vfs_fat_mount_config_t {
        format_if_mount_failed: true,
        max_files: 4,
        allocation_unit_size: 4096,
        ..Default::default()
    };
    let mut wl: esp_idf_svc::sys::wl_handle_t = 0;
    // SAFETY: all pointers are valid for the duration of the call.
    esp_idf_svc::sys::esp!(unsafe {
        esp_idf_svc::sys::esp_vfs_fat_spiflash_mount_rw_wl(
            c"/spiflash".as_ptr(),
            WEB_PARTITION.as_ptr(),
            &conf,
            &mut wl,
        )
    })?;
    info!("fs: mounted {}", WEB_ROOT);
    Ok(())
}

//! Radio-mode state machine.
//!
//! ```text
//!        ModeRequest                         ModeRequest
//!  ┌─────────────────────────────┐  ┌──────────────────────────────┐
//!  │                             ▼  │                              ▼
//!  │  Station                    AccessPoint
//!  │  ┌──────────────┐           ┌──────────┐  client   ┌─────────────────┐
//!  │  │ Disconnected │◀──┐       │   Idle   │─attached─▶│ ClientAttached  │
//!  │  └──────┬───────┘   │       └──────────┘◀─last────└─────────────────┘
//!  │  request│reconnect  │disconnected        detached
//!  │  ┌──────▼───────┐   │
//!  │  │  Connecting  │───┤
//!  │  └──────┬───────┘   │
//!  │    got ip│          │
//!  │  ┌──────▼───────┐   │
//!  │  │  Connected   │───┘
//!  │  └──────────────┘
//! ```
//!
//! The controller owns the radio driver, the transport lifecycle and the
//! reconnect timer.  It is driven exclusively by [`Internal`] messages on
//! its private bus listener: driver notifications, its own reconnect
//! requests, timer expiries and mode-toggle commands.  Every externally
//! visible change is republished as a [`WlanEvent`] on the public type.
//!
//! Role changes are always ordered: stop transport, stop current role,
//! start new role.  The transport is started only once the new role
//! reports readiness (got IP, or a client attached to the access point).

pub mod events;
pub mod scan;

use core::sync::atomic::{AtomicU8, Ordering};
use core::time::Duration;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::adapters::credentials::{CredentialStore, WifiNetwork};
use crate::app::ports::{RadioDriver, ReconnectTimer, Transport};
use crate::bus::{Listener, Message, MessageBus, MessageType};
use crate::connection::Role;
use crate::error::BusError;

pub use events::{Internal, WlanEvent};
use scan::ScanResults;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioMode {
    Station,
    AccessPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RadioState {
    StationDisconnected = 0,
    StationConnecting = 1,
    StationConnected = 2,
    AccessPointIdle = 3,
    AccessPointClientAttached = 4,
}

impl RadioState {
    pub fn mode(self) -> RadioMode {
        match self {
            Self::StationDisconnected | Self::StationConnecting | Self::StationConnected => {
                RadioMode::Station
            }
            Self::AccessPointIdle | Self::AccessPointClientAttached => RadioMode::AccessPoint,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::StationConnecting,
            2 => Self::StationConnected,
            3 => Self::AccessPointIdle,
            4 => Self::AccessPointClientAttached,
            _ => Self::StationDisconnected,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle shared with other threads
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SharedStatus {
    state: AtomicU8,
    ap_clients: AtomicU8,
}

/// Cheap, clonable access to the controller from other threads: post
/// commands and driver events, read the current state.
#[derive(Clone)]
pub struct WlanHandle {
    bus: Arc<MessageBus>,
    public: MessageType,
    internal: MessageType,
    status: Arc<SharedStatus>,
}

impl WlanHandle {
    /// Register the public and internal message types on `bus`.
    pub fn new(bus: Arc<MessageBus>) -> Result<Self, BusError> {
        let public = bus.register_type()?;
        let internal = bus.register_type()?;
        Ok(Self {
            bus,
            public,
            internal,
            status: Arc::default(),
        })
    }

    /// Message type carrying [`WlanEvent`] values.
    pub fn event_type(&self) -> MessageType {
        self.public
    }

    pub fn internal_type(&self) -> MessageType {
        self.internal
    }

    /// Ask the controller to switch between Station and AccessPoint.
    pub fn toggle_mode(&self) -> Result<(), BusError> {
        self.driver_event(Internal::ModeRequest)
    }

    /// Post a control or driver event to the controller.
    pub fn driver_event(&self, event: Internal) -> Result<(), BusError> {
        self.bus.send_value(self.internal, event as u32).map(|_| ())
    }

    pub fn state(&self) -> RadioState {
        RadioState::from_u8(self.status.state.load(Ordering::Acquire))
    }

    pub fn ap_clients(&self) -> u8 {
        self.status.ap_clients.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct RadioController<D, T, K> {
    driver: D,
    transport: T,
    timer: K,
    credentials: Arc<CredentialStore>,
    scan: Arc<ScanResults>,
    handle: WlanHandle,
    listener: Listener,
    state: RadioState,
    ap_clients: u8,
    reconnect_armed: bool,
    reconnect_period: Duration,
}

impl<D, T, K> RadioController<D, T, K>
where
    D: RadioDriver,
    T: Transport,
    K: ReconnectTimer,
{
    pub fn new(
        handle: WlanHandle,
        driver: D,
        transport: T,
        timer: K,
        credentials: Arc<CredentialStore>,
        scan: Arc<ScanResults>,
        reconnect_period: Duration,
    ) -> Result<Self, BusError> {
        let listener = handle.bus.listen(handle.internal)?;
        Ok(Self {
            driver,
            transport,
            timer,
            credentials,
            scan,
            handle,
            listener,
            state: RadioState::StationDisconnected,
            ap_clients: 0,
            reconnect_armed: false,
            reconnect_period,
        })
    }

    pub fn handle(&self) -> WlanHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> RadioState {
        self.state
    }

    pub fn reconnect_armed(&self) -> bool {
        self.reconnect_armed
    }

    /// Bring up the Station role.  Scanning starts once the driver reports
    /// the role started.
    pub fn start(&mut self) {
        info!("wlan: starting in station mode");
        self.set_state(RadioState::StationDisconnected);
        if let Err(e) = self.driver.start_station() {
            error!("wlan: station start failed: {}", e);
        }
    }

    /// Block on the listener forever, handling one message at a time.
    pub fn run(mut self) -> ! {
        self.start();
        loop {
            let msg = self.listener.receive();
            self.handle_message(&msg);
        }
    }

    /// Handle every message already queued.  Returns how many were handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(msg) = self.listener.try_receive() {
            self.handle_message(&msg);
            handled += 1;
        }
        handled
    }

    pub fn handle_message(&mut self, msg: &Message) {
        match msg.value().and_then(Internal::from_u32) {
            Some(event) => self.handle_event(event),
            None => warn!("wlan: ignoring unexpected message {:?}", msg.body()),
        }
    }

    /// Run one transition.
    pub fn handle_event(&mut self, event: Internal) {
        debug!("wlan: {:?} in {:?}", event, self.state);
        let station = self.state.mode() == RadioMode::Station;
        match event {
            Internal::ModeRequest => self.toggle(),

            Internal::StationStarted if station => self.request_reconnect(),

            Internal::RequestReconnect if station => {
                if self.state == RadioState::StationConnected {
                    debug!("wlan: already connected, reconnect dropped");
                } else {
                    self.timer.arm(self.reconnect_period);
                    self.reconnect_armed = true;
                    self.scan_and_connect();
                }
            }

            Internal::ReconnectTimer if station => {
                self.reconnect_armed = false;
                if self.state != RadioState::StationConnected {
                    self.request_reconnect();
                }
            }

            Internal::GotIp if station => {
                self.timer.disarm();
                self.reconnect_armed = false;
                self.set_state(RadioState::StationConnected);
                self.publish(WlanEvent::Connected);
                self.transport.start(Role::StationClient);
            }

            Internal::StationDisconnected if station => {
                self.transport.stop();
                self.set_state(RadioState::StationDisconnected);
                self.publish(WlanEvent::Disconnected);
                if !self.reconnect_armed {
                    self.request_reconnect();
                }
            }

            Internal::AccessPointStarted if !station => self.publish(WlanEvent::ApStarted),

            Internal::ApClientAttached if !station => {
                self.set_ap_clients(self.ap_clients.saturating_add(1));
                self.set_state(RadioState::AccessPointClientAttached);
                self.publish(WlanEvent::ApClientConnected);
                if self.ap_clients == 1 {
                    self.transport.start(Role::AccessPointClient);
                }
            }

            Internal::ApClientDetached if !station => {
                if self.ap_clients == 0 {
                    warn!("wlan: detach without attached client");
                    return;
                }
                self.set_ap_clients(self.ap_clients - 1);
                self.publish(WlanEvent::ApClientDisconnected);
                if self.ap_clients == 0 {
                    self.transport.stop();
                    self.set_state(RadioState::AccessPointIdle);
                }
            }

            other => debug!("wlan: {:?} ignored in {:?}", other, self.state),
        }
    }

    fn toggle(&mut self) {
        self.transport.stop();
        match self.state.mode() {
            RadioMode::Station => {
                info!("wlan: station -> access point");
                self.timer.disarm();
                self.reconnect_armed = false;
                if self.state == RadioState::StationConnected {
                    self.publish(WlanEvent::Disconnected);
                }
                if let Err(e) = self.driver.stop_station() {
                    error!("wlan: station stop failed: {}", e);
                }
                self.set_ap_clients(0);
                self.set_state(RadioState::AccessPointIdle);
                if let Err(e) = self.driver.start_access_point() {
                    error!("wlan: access point start failed: {}", e);
                }
            }
            RadioMode::AccessPoint => {
                info!("wlan: access point -> station");
                for _ in 0..self.ap_clients {
                    self.publish(WlanEvent::ApClientDisconnected);
                }
                self.set_ap_clients(0);
                if let Err(e) = self.driver.stop_access_point() {
                    error!("wlan: access point stop failed: {}", e);
                }
                self.publish(WlanEvent::ApStopped);
                self.set_state(RadioState::StationDisconnected);
                if let Err(e) = self.driver.start_station() {
                    error!("wlan: station start failed: {}", e);
                }
            }
        }
    }

    /// Scan, then associate with the first scanned network we hold
    /// credentials for.  A busy scan gate skips this cycle.
    fn scan_and_connect(&mut self) {
        let Ok(mut results) = self.scan.try_get() else {
            warn!("wlan: scan results busy, skipping scan");
            return;
        };
        self.publish(WlanEvent::ScanStarted);
        let scanned = self.driver.scan();
        self.publish(WlanEvent::ScanStopped);

        match scanned {
            Ok(records) => {
                info!("wlan: found {} access points", records.len());
                results.replace(records);
            }
            Err(e) => {
                warn!("wlan: scan failed: {}", e);
                return;
            }
        }

        let candidate: Option<WifiNetwork> = match self.credentials.checkout() {
            Ok(creds) => creds.first_match(&results).cloned(),
            Err(e) => {
                warn!("wlan: credentials unavailable: {}", e);
                None
            }
        };
        drop(results);

        let Some(network) = candidate else {
            info!(
                "wlan: no known network, retry in {}s",
                self.reconnect_period.as_secs()
            );
            self.set_state(RadioState::StationDisconnected);
            return;
        };
        info!("wlan: connecting to {}", network.ssid);
        self.set_state(RadioState::StationConnecting);
        if let Err(e) = self.driver.connect(&network.ssid, &network.key) {
            warn!("wlan: connect to {} failed: {}", network.ssid, e);
            self.set_state(RadioState::StationDisconnected);
        }
    }

    fn set_state(&mut self, state: RadioState) {
        if self.state != state {
            debug!("wlan: {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.handle
            .status
            .state
            .store(state as u8, Ordering::Release);
    }

    fn set_ap_clients(&mut self, n: u8) {
        self.ap_clients = n;
        self.handle.status.ap_clients.store(n, Ordering::Release);
    }

    fn publish(&self, event: WlanEvent) {
        if let Err(e) = self.handle.bus.send_value(self.handle.public, event as u32) {
            error!("wlan: publishing {:?} failed: {}", event, e);
        }
    }

    /// Queue a reconnect cycle.  If the internal queue is full the cycle
    /// falls back to the reconnect timer so the station never goes idle
    /// with nothing pending.
    fn request_reconnect(&mut self) {
        let Err(e) = self.handle.driver_event(Internal::RequestReconnect) else {
            return;
        };
        error!("wlan: posting reconnect request failed: {}", e);
        if !self.reconnect_armed {
            self.timer.arm(self.reconnect_period);
            self.reconnect_armed = true;
        }
    }
}

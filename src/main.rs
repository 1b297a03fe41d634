//! Audio appliance firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  EspRadio        HttpTransport     EspReconnectTimer  NvsStore │
//! │  (RadioDriver)   (Transport)       (ReconnectTimer)   (Storage)│
//! │  MdnsAdapter     CredentialStore                               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌──────────────────┐  ┌────────────┐  ┌────────────────────┐  │
//! │  │ RadioController  │  │ RpcService │  │  ConnectionTable   │  │
//! │  │ (main task)      │  │ (rpc task) │  │  (shared, locked)  │  │
//! │  └──────────────────┘  └────────────┘  └────────────────────┘  │
//! │                                                                │
//! │                  MessageBus (all cross-task traffic)           │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::wifi::EspWifi;

use audio_firmware::adapters::credentials::CredentialStore;
use audio_firmware::adapters::http::{HttpTransport, mount_web_root};
use audio_firmware::adapters::mdns::MdnsAdapter;
use audio_firmware::adapters::nvs::NvsStore;
use audio_firmware::adapters::timer::EspReconnectTimer;
use audio_firmware::adapters::wifi::{EspRadio, subscribe};
use audio_firmware::bus::MessageBus;
use audio_firmware::connection::ConnectionTable;
use audio_firmware::error::Error;
use audio_firmware::rpc::RpcService;
use audio_firmware::rpc::methods::{MethodContext, build_engine};
use audio_firmware::wlan::scan::ScanResults;
use audio_firmware::wlan::{RadioController, WlanHandle};

const RPC_STACK_SIZE: usize = 8 * 1024;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("audio-firmware v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Storage + config ───────────────────────────────────
    let nvs = NvsStore::new().map_err(Error::from)?;
    let config = nvs.load_config();
    if let Err(e) = mount_web_root() {
        warn!("fs: web root unavailable ({}), file requests will fail", e);
    }

    // ── 3. Core ───────────────────────────────────────────────
    let bus = Arc::new(MessageBus::new());
    let wlan = WlanHandle::new(Arc::clone(&bus)).map_err(Error::from)?;
    let connections = Arc::new(
        ConnectionTable::new(Arc::clone(&bus), config.lock_wait()).map_err(Error::from)?,
    );
    let frames = bus.register_type().map_err(Error::from)?;
    let credentials = Arc::new(CredentialStore::open(Box::new(nvs), config.lock_wait()));
    let scan = Arc::new(ScanResults::new());

    // ── 4. Radio ──────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let wifi = EspWifi::new(peripherals.modem, sysloop.clone(), None)?;
    let radio = EspRadio::new(wifi, config.clone())?;
    let _subscriptions = subscribe(&sysloop, &wlan)?;
    let timer = EspReconnectTimer::new(wlan.clone())?;

    let mut mdns = MdnsAdapter::new(&config);
    mdns.start();

    // ── 5. Transport + RPC task ───────────────────────────────
    let transport = Arc::new(HttpTransport::new(
        Arc::clone(&bus),
        frames,
        Arc::clone(&connections),
        &config,
    ));
    let engine = build_engine(&MethodContext {
        wlan: wlan.clone(),
        scan: Arc::clone(&scan),
        connections: Arc::clone(&connections),
        config: config.clone(),
    });
    let rpc = RpcService::new(&bus, frames, engine, Arc::clone(&transport)).map_err(Error::from)?;
    std::thread::Builder::new()
        .name("rpc".into())
        .stack_size(RPC_STACK_SIZE)
        .spawn(move || rpc.run())?;

    // ── 6. Radio controller (never returns) ───────────────────
    let controller = RadioController::new(
        wlan,
        radio,
        transport,
        timer,
        credentials,
        scan,
        config.reconnect_period(),
    )
    .map_err(Error::from)?;
    info!("System ready. Entering radio loop.");
    controller.run()
}

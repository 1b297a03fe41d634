//! Device method table.
//!
//! | Method              | Params | Result                                   |
//! |---------------------|--------|------------------------------------------|
//! | `wlan.status`       | none   | `{mode, state, ap_clients}`              |
//! | `wlan.toggle_mode`  | none   | `true` once the request is queued        |
//! | `wlan.scan_results` | none   | `[{ssid, rssi}, ...]` of the last scan   |
//! | `con.count`         | none   | number of live connections               |
//! | `sys.info`          | none   | `{name, version, hostname}`              |

use std::sync::Arc;

use serde::Serialize;

use crate::config::SystemConfig;
use crate::connection::ConnectionTable;
use crate::wlan::scan::{ApRecord, ScanResults};
use crate::wlan::{RadioMode, RadioState, WlanHandle};

use super::engine::{MethodDescriptor, RpcEngine};

/// The last scan is being written; try again.
pub const ERR_SCAN_BUSY: i32 = 1;
/// The radio controller could not accept the request.
pub const ERR_RADIO_BUSY: i32 = 2;

#[derive(Serialize)]
struct WlanStatus {
    mode: RadioMode,
    state: RadioState,
    ap_clients: u8,
}

#[derive(Serialize)]
struct SysInfo {
    name: &'static str,
    version: &'static str,
    hostname: heapless::String<24>,
}

/// Everything the methods read from or post to.
#[derive(Clone)]
pub struct MethodContext {
    pub wlan: WlanHandle,
    pub scan: Arc<ScanResults>,
    pub connections: Arc<ConnectionTable>,
    pub config: SystemConfig,
}

/// Build the engine with every device method and error message registered.
pub fn build_engine(ctx: &MethodContext) -> RpcEngine {
    let mut engine = RpcEngine::new();
    engine
        .register_error(ERR_SCAN_BUSY, "scan in progress")
        .register_error(ERR_RADIO_BUSY, "radio busy");

    let wlan = ctx.wlan.clone();
    engine.register(MethodDescriptor::without_params("wlan.status", move || {
        let state = wlan.state();
        Ok(WlanStatus {
            mode: state.mode(),
            state,
            ap_clients: wlan.ap_clients(),
        })
    }));

    let wlan = ctx.wlan.clone();
    engine.register(MethodDescriptor::without_params(
        "wlan.toggle_mode",
        move || wlan.toggle_mode().map(|()| true).map_err(|_| ERR_RADIO_BUSY),
    ));

    let scan = Arc::clone(&ctx.scan);
    engine.register(MethodDescriptor::without_params(
        "wlan.scan_results",
        move || {
            let results = scan.try_get().map_err(|_| ERR_SCAN_BUSY)?;
            Ok(results.iter().cloned().collect::<Vec<ApRecord>>())
        },
    ));

    let connections = Arc::clone(&ctx.connections);
    engine.register(MethodDescriptor::without_params("con.count", move || {
        Ok(connections.count())
    }));

    let hostname = ctx.config.hostname.clone();
    engine.register(MethodDescriptor::without_params("sys.info", move || {
        Ok(SysInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            hostname: hostname.clone(),
        })
    }));

    engine
}

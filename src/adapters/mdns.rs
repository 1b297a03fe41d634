//! mDNS service advertisement adapter.
//!
//! Advertises `<hostname>.local` with the JSON-RPC-over-WebSocket service
//! (`_audio-jsonrpc-ws._tcp` on port 80 by default) and a `version` TXT
//! record.  Uses the ESP-IDF mDNS component on the device and only logs
//! on simulation targets.

use log::info;

use crate::config::SystemConfig;

const SERVICE_PROTO: &str = "_tcp";
const INSTANCE_NAME: &str = "audio";

/// mDNS advertisement adapter.
pub struct MdnsAdapter {
    hostname: heapless::String<24>,
    service: heapless::String<32>,
    port: u16,
    active: bool,
}

impl MdnsAdapter {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            hostname: config.hostname.clone(),
            service: config.mdns_service.clone(),
            port: config.http_port,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Register hostname and service.  Idempotent.
    pub fn start(&mut self) {
        if self.active {
            return;
        }
        self.active = self.platform_start();
        if self.active {
            info!(
                "mdns: advertising {}.local {}.{}:{}",
                self.hostname, self.service, SERVICE_PROTO, self.port
            );
        }
    }

    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.platform_stop();
        self.active = false;
        info!("mdns: stopped");
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&self) -> bool {
        use esp_idf_svc::sys::*;

        fn c_buf<const N: usize>(s: &str) -> [u8; N] {
            let mut buf = [0u8; N];
            let len = s.len().min(N - 1);
            buf[..len].copy_from_slice(&s.as_bytes()[..len]);
            buf
        }

        let hostname = c_buf::<32>(&self.hostname);
        let service = c_buf::<40>(&self.service);
        let proto = c_buf::<8>(SERVICE_PROTO);
        let instance = c_buf::<16>(INSTANCE_NAME);
        let version = concat!(env!("CARGO_PKG_VERSION"), "\0");

        // SAFETY: every pointer refers to a NUL-terminated stack buffer that
        // outlives the call; mdns copies its arguments.
        unsafe {
            let ret = mdns_init();
            if ret != ESP_OK {
                log::error!("mdns: init failed ({})", ret);
                return false;
            }
            let ret = mdns_hostname_set(hostname.as_ptr().cast());
            if ret != ESP_OK {
                log::error!("mdns: hostname failed ({})", ret);
                mdns_free();
                return false;
            }
            let ret = mdns_service_add(
                instance.as_ptr().cast(),
                service.as_ptr().cast(),
                proto.as_ptr().cast(),
                self.port,
                core::ptr::null_mut(),
                0,
            );
            if ret != ESP_OK {
                log::error!("mdns: service add failed ({})", ret);
                mdns_free();
                return false;
            }
            mdns_service_txt_item_set(
                service.as_ptr().cast(),
                proto.as_ptr().cast(),
                c"version".as_ptr(),
                version.as_ptr().cast(),
            );
        }
        true
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&self) -> bool {
        info!(
            "mdns(sim): {} instance {} v{}",
            self.hostname,
            INSTANCE_NAME,
            env!("CARGO_PKG_VERSION")
        );
        true
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&self) {
        // SAFETY: only reached after a successful mdns_init.
        unsafe {
            esp_idf_svc::sys::mdns_free();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&self) {}
}

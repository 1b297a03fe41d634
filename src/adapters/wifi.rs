//! Wi-Fi radio adapter.
//!
//! Implements [`RadioDriver`] and bridges driver notifications onto the
//! radio controller's internal message type.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspRadio` drives `esp_idf_svc::wifi::EspWifi`;
//!   [`subscribe`] forwards Wi-Fi and IP events from the system event loop.
//! - **all other targets**: `SimRadio`, an in-process simulation that posts
//!   the same notifications the real driver would.

use log::{info, warn};

use crate::app::ports::RadioDriver;
use crate::error::RadioError;
use crate::wlan::scan::{ApRecord, ApRecords};
use crate::wlan::{Internal, WlanHandle};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

/// WPA2 keys are 8-64 bytes; an empty key means an open network.
pub fn validate_key(key: &str) -> Result<(), RadioError> {
    if key.is_empty() || (8..=64).contains(&key.len()) {
        Ok(())
    } else {
        Err(RadioError::InvalidCredentials)
    }
}

/// On the device a lost driver notification restarts the chip; the
/// controller has no other way to learn about it.
fn post(handle: &WlanHandle, event: Internal) {
    let Err(e) = handle.driver_event(event) else {
        return;
    };
    log::error!("wlan: driver event {:?} lost: {}", event, e);
    #[cfg(target_os = "espidf")]
    if e.is_fatal() {
        esp_idf_svc::hal::reset::restart();
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF driver
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use super::*;
    use crate::config::SystemConfig;
    use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
    use esp_idf_svc::netif::IpEvent;
    use esp_idf_svc::sys::EspError;
    use esp_idf_svc::wifi::{
        AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
        WifiEvent,
    };

    pub struct EspRadio {
        wifi: EspWifi<'static>,
        config: SystemConfig,
    }

    impl EspRadio {
        pub fn new(mut wifi: EspWifi<'static>, config: SystemConfig) -> Result<Self, EspError> {
            wifi.sta_netif_mut().set_hostname(&config.hostname)?;
            wifi.ap_netif_mut().set_hostname(&config.hostname)?;
            let mut cc = [0u8; 4];
            cc[..2].copy_from_slice(config.country_code.as_bytes());
            // SAFETY: `cc` is NUL-terminated; the driver is initialised.
            esp_idf_svc::sys::esp!(unsafe {
                esp_idf_svc::sys::esp_wifi_set_country_code(cc.as_ptr().cast(), true)
            })?;
            info!("wlan: country code {}", config.country_code);
            Ok(Self { wifi, config })
        }

        fn start_with(&mut self, conf: Configuration) -> Result<(), RadioError> {
            self.wifi
                .set_configuration(&conf)
                .and_then(|()| self.wifi.start())
                .map_err(|e| {
                    log::error!("wlan: driver start failed: {}", e);
                    RadioError::RoleChange
                })
        }
    }

    impl RadioDriver for EspRadio {
        fn start_station(&mut self) -> Result<(), RadioError> {
            self.start_with(Configuration::Client(ClientConfiguration::default()))
        }

        fn stop_station(&mut self) -> Result<(), RadioError> {
            // Not associated is fine here.
            let _ = self.wifi.disconnect();
            self.wifi.stop().map_err(|_| RadioError::RoleChange)
        }

        fn start_access_point(&mut self) -> Result<(), RadioError> {
            let c = &self.config;
            let auth_method = if c.ap_key.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            let ap = AccessPointConfiguration {
                ssid: c.ap_ssid.as_str().try_into().map_err(|_| RadioError::InvalidCredentials)?,
                password: c.ap_key.as_str().try_into().map_err(|_| RadioError::InvalidCredentials)?,
                channel: c.ap_channel,
                max_connections: u16::from(c.ap_max_clients),
                auth_method,
                ..Default::default()
            };
            self.start_with(Configuration::AccessPoint(ap))
        }

        fn stop_access_point(&mut self) -> Result<(), RadioError> {
            // SAFETY: AID 0 deauthenticates every station.
            unsafe {
                esp_idf_svc::sys::esp_wifi_deauth_sta(0);
            }
            self.wifi.stop().map_err(|_| RadioError::RoleChange)
        }

        fn scan(&mut self) -> Result<ApRecords, RadioError> {
            let found = self.wifi.scan().map_err(|e| {
                warn!("wlan: scan failed: {}", e);
                RadioError::ScanFailed
            })?;
            Ok(found
                .iter()
                .take(crate::config::SCAN_MAX_AP)
                .map(|ap| ApRecord::new(ap.ssid.as_str(), ap.signal_strength))
                .collect())
        }

        fn connect(&mut self, ssid: &str, key: &str) -> Result<(), RadioError> {
            validate_key(key)?;
            let auth_method = if key.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            let client = ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| RadioError::InvalidCredentials)?,
                password: key.try_into().map_err(|_| RadioError::InvalidCredentials)?,
                auth_method,
                ..Default::default()
            };
            self.wifi
                .set_configuration(&Configuration::Client(client))
                .and_then(|()| self.wifi.connect())
                .map_err(|e| {
                    warn!("wlan: connect failed: {}", e);
                    RadioError::ConnectFailed
                })
        }
    }

    /// Forward Wi-Fi and IP events to the controller.  Keep the returned
    /// subscriptions alive for as long as events should flow.
    pub fn subscribe(
        sysloop: &EspSystemEventLoop,
        handle: &WlanHandle,
    ) -> Result<[EspSubscription<'static, System>; 2], EspError> {
        let wifi_handle = handle.clone();
        let wifi = sysloop.subscribe::<WifiEvent, _>(move |event| {
            let internal = match event {
                WifiEvent::StaStarted => Internal::StationStarted,
                WifiEvent::StaDisconnected(_) => {
                    info!("wlan: station disconnected");
                    Internal::StationDisconnected
                }
                WifiEvent::ApStarted => Internal::AccessPointStarted,
                WifiEvent::ApStaConnected(_) => Internal::ApClientAttached,
                WifiEvent::ApStaDisconnected(_) => Internal::ApClientDetached,
                _ => return,
            };
            post(&wifi_handle, internal);
        })?;
        let ip_handle = handle.clone();
        let ip = sysloop.subscribe::<IpEvent, _>(move |event| {
            if let IpEvent::DhcpIpAssigned(assignment) = event {
                info!("wlan: got ip {}", assignment.ip());
                post(&ip_handle, Internal::GotIp);
            }
        })?;
        Ok([wifi, ip])
    }
}

#[cfg(target_os = "espidf")]
pub use esp::{EspRadio, subscribe};

// ───────────────────────────────────────────────────────────────
// Simulation driver
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMode {
    Off,
    Station,
    AccessPoint,
}

/// Host stand-in for the Wi-Fi driver.  Role changes and association
/// complete immediately and are reported through the controller's handle.
#[cfg(not(target_os = "espidf"))]
pub struct SimRadio {
    handle: WlanHandle,
    networks: Vec<(ApRecord, heapless::String<64>)>,
    mode: SimMode,
    associated: bool,
    scans: u32,
}

#[cfg(not(target_os = "espidf"))]
impl SimRadio {
    pub fn new(handle: WlanHandle) -> Self {
        Self {
            handle,
            networks: Vec::new(),
            mode: SimMode::Off,
            associated: false,
            scans: 0,
        }
    }

    /// Make a network visible to scans.
    pub fn add_network(&mut self, ssid: &str, key: &str, rssi: i8) {
        let mut k = heapless::String::new();
        let _ = k.push_str(key);
        self.networks.push((ApRecord::new(ssid, rssi), k));
    }

    pub fn mode(&self) -> SimMode {
        self.mode
    }

    pub fn is_associated(&self) -> bool {
        self.associated
    }

    pub fn scans(&self) -> u32 {
        self.scans
    }

    /// The access point drops the station.
    pub fn drop_link(&mut self) {
        if self.associated {
            self.associated = false;
            post(&self.handle, Internal::StationDisconnected);
        }
    }

    pub fn client_joins(&self) {
        if self.mode == SimMode::AccessPoint {
            post(&self.handle, Internal::ApClientAttached);
        }
    }

    pub fn client_leaves(&self) {
        if self.mode == SimMode::AccessPoint {
            post(&self.handle, Internal::ApClientDetached);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl RadioDriver for SimRadio {
    fn start_station(&mut self) -> Result<(), RadioError> {
        if self.mode != SimMode::Off {
            return Err(RadioError::RoleChange);
        }
        self.mode = SimMode::Station;
        info!("wlan(sim): station started");
        post(&self.handle, Internal::StationStarted);
        Ok(())
    }

    fn stop_station(&mut self) -> Result<(), RadioError> {
        if self.mode != SimMode::Station {
            return Err(RadioError::RoleChange);
        }
        self.drop_link();
        self.mode = SimMode::Off;
        Ok(())
    }

    fn start_access_point(&mut self) -> Result<(), RadioError> {
        if self.mode != SimMode::Off {
            return Err(RadioError::RoleChange);
        }
        self.mode = SimMode::AccessPoint;
        info!("wlan(sim): access point started");
        post(&self.handle, Internal::AccessPointStarted);
        Ok(())
    }

    fn stop_access_point(&mut self) -> Result<(), RadioError> {
        if self.mode != SimMode::AccessPoint {
            return Err(RadioError::RoleChange);
        }
        self.mode = SimMode::Off;
        Ok(())
    }

    fn scan(&mut self) -> Result<ApRecords, RadioError> {
        if self.mode != SimMode::Station {
            return Err(RadioError::ScanFailed);
        }
        self.scans += 1;
        let mut out = ApRecords::new();
        for (rec, _) in self.networks.iter().take(out.capacity()) {
            let _ = out.push(rec.clone());
        }
        Ok(out)
    }

    fn connect(&mut self, ssid: &str, key: &str) -> Result<(), RadioError> {
        validate_key(key)?;
        if self.mode != SimMode::Station {
            return Err(RadioError::ConnectFailed);
        }
        let accepted = self
            .networks
            .iter()
            .any(|(rec, k)| rec.ssid == ssid && k == key);
        if accepted {
            self.associated = true;
            post(&self.handle, Internal::GotIp);
        } else {
            warn!("wlan(sim): association with {} rejected", ssid);
            post(&self.handle, Internal::StationDisconnected);
        }
        Ok(())
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use crate::bus::{Listener, MessageBus};
    use std::sync::Arc;

    fn sim() -> (SimRadio, Listener) {
        let bus = Arc::new(MessageBus::new());
        let handle = WlanHandle::new(Arc::clone(&bus)).unwrap();
        let l = bus.listen(handle.internal_type()).unwrap();
        (SimRadio::new(handle), l)
    }

    fn next(l: &Listener) -> Option<Internal> {
        l.try_receive().and_then(|m| m.value()).and_then(Internal::from_u32)
    }

    #[test]
    fn key_validation() {
        assert!(validate_key("").is_ok());
        assert!(validate_key("12345678").is_ok());
        assert_eq!(validate_key("short"), Err(RadioError::InvalidCredentials));
        assert!(validate_key(&"k".repeat(65)).is_err());
    }

    #[test]
    fn station_start_reports_started() {
        let (mut r, l) = sim();
        r.start_station().unwrap();
        assert_eq!(next(&l), Some(Internal::StationStarted));
        assert_eq!(r.start_station(), Err(RadioError::RoleChange));
    }

    #[test]
    fn connect_with_right_key_gets_ip() {
        let (mut r, l) = sim();
        r.add_network("Home", "password1", -40);
        r.start_station().unwrap();
        let _ = next(&l);
        r.connect("Home", "password1").unwrap();
        assert_eq!(next(&l), Some(Internal::GotIp));
        assert!(r.is_associated());
    }

    #[test]
    fn connect_with_wrong_key_disconnects() {
        let (mut r, l) = sim();
        r.add_network("Home", "password1", -40);
        r.start_station().unwrap();
        let _ = next(&l);
        r.connect("Home", "password2").unwrap();
        assert_eq!(next(&l), Some(Internal::StationDisconnected));
    }

    #[test]
    fn scan_only_in_station_mode() {
        let (mut r, _l) = sim();
        r.add_network("A", "", -30);
        assert_eq!(r.scan(), Err(RadioError::ScanFailed));
        r.start_station().unwrap();
        assert_eq!(r.scan().unwrap().len(), 1);
        assert_eq!(r.scans(), 1);
    }

    #[test]
    fn ap_clients_only_in_ap_mode() {
        let (mut r, l) = sim();
        r.client_joins();
        assert_eq!(next(&l), None);
        r.start_access_point().unwrap();
        assert_eq!(next(&l), Some(Internal::AccessPointStarted));
        r.client_joins();
        r.client_leaves();
        assert_eq!(next(&l), Some(Internal::ApClientAttached));
        assert_eq!(next(&l), Some(Internal::ApClientDetached));
    }
}

//! Single-shot reconnect timer.
//!
//! Expiry posts [`Internal::ReconnectTimer`] to the radio controller.
//!
//! - **`target_os = "espidf"`**: one `esp_timer` dispatched from the ESP
//!   timer task, started with `esp_timer_start_once`.
//! - **host**: a sleeper thread per arm; a generation counter makes every
//!   superseded or disarmed sleeper expire silently.

use core::time::Duration;

use crate::app::ports::ReconnectTimer;
use crate::wlan::{Internal, WlanHandle};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(not(target_os = "espidf"))]
use std::sync::Arc;
#[cfg(not(target_os = "espidf"))]
use std::sync::atomic::{AtomicU32, Ordering};

fn fire(handle: &WlanHandle) {
    if let Err(e) = handle.driver_event(Internal::ReconnectTimer) {
        log::error!("wlan: reconnect timer post failed: {}", e);
    }
}

// ---------------------------------------------------------------------------
// ESP-IDF
// ---------------------------------------------------------------------------

#[cfg(target_os = "espidf")]
pub struct EspReconnectTimer {
    timer: esp_timer_handle_t,
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn reconnect_cb(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the leaked `WlanHandle` from `EspReconnectTimer::new`.
    let handle = unsafe { &*arg.cast::<WlanHandle>() };
    fire(handle);
}

#[cfg(target_os = "espidf")]
impl EspReconnectTimer {
    pub fn new(handle: WlanHandle) -> Result<Self, crate::error::Error> {
        // The timer lives for the process; so does its context.
        let ctx: &'static mut WlanHandle = Box::leak(Box::new(handle));
        let args = esp_timer_create_args_t {
            callback: Some(reconnect_cb),
            arg: (ctx as *mut WlanHandle).cast(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: c"reconnect".as_ptr(),
            skip_unhandled_events: true,
        };
        let mut timer: esp_timer_handle_t = core::ptr::null_mut();
        // SAFETY: `args` is fully initialised and `timer` is a valid out-pointer.
        let ret = unsafe { esp_timer_create(&args, &mut timer) };
        if ret != ESP_OK {
            log::error!("wlan: reconnect timer create failed (rc={})", ret);
            return Err(crate::error::Error::Init("reconnect timer"));
        }
        Ok(Self { timer })
    }
}

#[cfg(target_os = "espidf")]
impl ReconnectTimer for EspReconnectTimer {
    fn arm(&mut self, after: Duration) {
        // SAFETY: `self.timer` is a valid handle from `esp_timer_create`.
        unsafe {
            // Stopping an idle timer returns ESP_ERR_INVALID_STATE; harmless.
            esp_timer_stop(self.timer);
            let ret = esp_timer_start_once(self.timer, after.as_micros() as u64);
            if ret != ESP_OK {
                log::error!("wlan: reconnect timer start failed (rc={})", ret);
            }
        }
    }

    fn disarm(&mut self) {
        // SAFETY: as above.
        unsafe {
            esp_timer_stop(self.timer);
        }
    }
}

// SAFETY: the handle is only used through the thread-safe esp_timer API.
#[cfg(target_os = "espidf")]
unsafe impl Send for EspReconnectTimer {}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

#[cfg(not(target_os = "espidf"))]
pub struct ThreadReconnectTimer {
    handle: WlanHandle,
    generation: Arc<AtomicU32>,
}

#[cfg(not(target_os = "espidf"))]
impl ThreadReconnectTimer {
    pub fn new(handle: WlanHandle) -> Self {
        Self {
            handle,
            generation: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl ReconnectTimer for ThreadReconnectTimer {
    fn arm(&mut self, after: Duration) {
        let armed = self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        let generation = Arc::clone(&self.generation);
        let handle = self.handle.clone();
        std::thread::spawn(move || {
            std::thread::sleep(after);
            if generation.load(Ordering::Acquire) == armed {
                fire(&handle);
            }
        });
    }

    fn disarm(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

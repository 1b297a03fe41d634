//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] on the ESP-IDF NVS partition, or on an
//! in-memory map for host builds.  Also loads and saves the
//! [`SystemConfig`] blob, validating before every write.

use log::{info, warn};

use crate::app::ports::StoragePort;
use crate::config::SystemConfig;
use crate::error::{Error, StorageError};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "audio";
const CONFIG_KEY: &str = "syscfg";

/// Largest blob this adapter reads back.
const MAX_BLOB_SIZE: usize = 1024;

/// NVS keys and namespaces are limited to 15 bytes plus NUL.
#[cfg(target_os = "espidf")]
fn c_name(name: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let len = name.len().min(15);
    buf[..len].copy_from_slice(&name.as_bytes()[..len]);
    buf
}

pub struct NvsStore {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

impl NvsStore {
    /// Initialise NVS flash.  A full or outdated partition is erased and
    /// re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("fs: erasing NVS partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("fs: NVS ready");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("fs: in-memory store");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Open `namespace`, run `f` with the handle, close.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(
        namespace: &str,
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    ) -> Result<T, esp_err_t> {
        let ns = c_name(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        // SAFETY: `ns` is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        // SAFETY: handle was opened above.
        unsafe { nvs_close(handle) };
        result
    }

    /// Stored configuration, or defaults when absent or unreadable.
    pub fn load_config(&self) -> SystemConfig {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => match postcard::from_bytes::<SystemConfig>(&buf[..len]) {
                Ok(cfg) if cfg.validate().is_ok() => {
                    info!("fs: loaded config ({} bytes)", len);
                    cfg
                }
                _ => {
                    warn!("fs: stored config invalid, using defaults");
                    SystemConfig::default()
                }
            },
            Err(StorageError::NotFound) => {
                info!("fs: no stored config, using defaults");
                SystemConfig::default()
            }
            Err(e) => {
                warn!("fs: config read failed ({}), using defaults", e);
                SystemConfig::default()
            }
        }
    }

    /// Validate and persist `config`.
    pub fn save_config(&mut self, config: &SystemConfig) -> Result<(), Error> {
        config.validate().map_err(Error::Config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| StorageError::IoError)?;
        self.write(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)?;
        info!("fs: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsStore {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let data = self
                .store
                .get(&Self::composite_key(namespace, key))
                .ok_or(StorageError::NotFound)?;
            if data.len() > buf.len() {
                return Err(StorageError::Full);
            }
            buf[..data.len()].copy_from_slice(data);
            Ok(data.len())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = c_name(key);
            Self::with_handle(namespace, false, |handle| {
                let mut size = buf.len();
                // SAFETY: `size` is the capacity of `buf`.
                let ret = unsafe {
                    nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
                };
                if ret == ESP_OK { Ok(size) } else { Err(ret) }
            })
            .map_err(|e| match e {
                ESP_ERR_NVS_NOT_FOUND => StorageError::NotFound,
                ESP_ERR_NVS_INVALID_LENGTH => StorageError::Full,
                _ => StorageError::IoError,
            })
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = c_name(key);
            Self::with_handle(namespace, true, |handle| {
                // SAFETY: `data` is valid for `data.len()` bytes.
                let ret = unsafe {
                    nvs_set_blob(handle, key.as_ptr().cast(), data.as_ptr().cast(), data.len())
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret == ESP_OK { Ok(()) } else { Err(ret) }
            })
            .map_err(|e| match e {
                ESP_ERR_NVS_NOT_ENOUGH_SPACE => StorageError::Full,
                _ => StorageError::IoError,
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.remove(&Self::composite_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = c_name(key);
            Self::with_handle(namespace, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, key.as_ptr().cast()) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret == ESP_OK { Ok(()) } else { Err(ret) }
            })
            .map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.contains_key(&Self::composite_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let key = c_name(key);
            Self::with_handle(namespace, false, |handle| {
                let mut size = 0usize;
                let ret = unsafe {
                    nvs_get_blob(handle, key.as_ptr().cast(), core::ptr::null_mut(), &mut size)
                };
                Ok(ret == ESP_OK)
            })
            .unwrap_or(false)
        }
    }
}

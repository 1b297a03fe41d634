//! `critical-section` 1.x implementation for ESP-IDF builds.
//!
//! `embassy-sync` takes its `CriticalSectionRawMutex` through these two
//! symbols.  A process-wide std mutex, re-entrant per thread through a
//! depth counter, is enough: every section here is a few instructions on
//! a queue or a table row.

use core::cell::{Cell, RefCell};
use std::sync::{Mutex, MutexGuard, PoisonError};

static SECTION: Mutex<()> = Mutex::new(());

thread_local! {
    static DEPTH: Cell<u8> = const { Cell::new(0) };
    static HELD: RefCell<Option<MutexGuard<'static, ()>>> = const { RefCell::new(None) };
}

#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_acquire() -> u8 {
    DEPTH.with(|depth| {
        let d = depth.get();
        if d == 0 {
            let guard = SECTION.lock().unwrap_or_else(PoisonError::into_inner);
            HELD.with(|held| *held.borrow_mut() = Some(guard));
        }
        depth.set(d.saturating_add(1));
        d
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_release(_restore: u8) {
    DEPTH.with(|depth| {
        let d = depth.get();
        if d == 0 {
            return;
        }
        depth.set(d - 1);
        if d == 1 {
            HELD.with(|held| *held.borrow_mut() = None);
        }
    });
}

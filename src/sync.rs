//! Bounded-wait locking on top of `embassy-sync` mutexes.

use core::time::Duration;

use async_io_mini::Timer;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};

/// Lock `mutex`, giving up after `wait`.
///
/// An uncontended lock is taken without arming a timer.
pub fn lock_within<M: RawMutex, T>(
    mutex: &Mutex<M, T>,
    wait: Duration,
) -> Option<MutexGuard<'_, M, T>> {
    if let Ok(guard) = mutex.try_lock() {
        return Some(guard);
    }
    futures_lite::future::block_on(futures_lite::future::or(
        async { Some(mutex.lock().await) },
        async {
            Timer::after(wait).await;
            None
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn free_lock_is_immediate() {
        let m: Mutex<CriticalSectionRawMutex, u8> = Mutex::new(1);
        assert_eq!(lock_within(&m, Duration::from_millis(1)).map(|g| *g), Some(1));
    }

    #[test]
    fn held_lock_times_out() {
        let m: Mutex<CriticalSectionRawMutex, u8> = Mutex::new(1);
        let _held = m.try_lock().unwrap();
        let start = Instant::now();
        assert!(lock_within(&m, Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn released_lock_is_acquired_while_waiting() {
        let m = Arc::new(Mutex::<CriticalSectionRawMutex, u8>::new(0));
        let holder = {
            let m = Arc::clone(&m);
            std::thread::spawn(move || {
                let mut g = futures_lite::future::block_on(m.lock());
                std::thread::sleep(Duration::from_millis(20));
                *g = 9;
            })
        };
        std::thread::sleep(Duration::from_millis(5));
        let got = lock_within(&m, Duration::from_secs(2)).map(|g| *g);
        holder.join().unwrap();
        assert_eq!(got, Some(9));
    }
}

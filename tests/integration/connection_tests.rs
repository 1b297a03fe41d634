//! Connection table under the transport's usage pattern.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use audio_firmware::bus::MessageBus;
use audio_firmware::config::MAX_CONNECTIONS;
use audio_firmware::connection::{ConnectionEvent, ConnectionTable, Role};
use audio_firmware::error::{ConnectionError, Error};

fn table() -> (Arc<MessageBus>, Arc<ConnectionTable>) {
    let bus = Arc::new(MessageBus::new());
    let table = Arc::new(ConnectionTable::new(Arc::clone(&bus), Duration::from_millis(50)).unwrap());
    (bus, table)
}

#[test]
fn capacity_is_enforced_across_threads() {
    let (_bus, table) = table();
    let handles: Vec<_> = (0..8)
        .map(|socket| {
            let table = Arc::clone(&table);
            thread::spawn(move || table.create(Role::AccessPointClient, socket).is_ok())
        })
        .collect();
    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(accepted, MAX_CONNECTIONS);
    assert_eq!(table.count(), MAX_CONNECTIONS);
}

#[test]
fn full_table_frees_a_slot_on_close() {
    let (_bus, table) = table();
    for socket in 0..MAX_CONNECTIONS as i32 {
        table.create(Role::StationClient, socket).unwrap();
    }
    assert!(matches!(
        table.create(Role::StationClient, 99),
        Err(Error::Connection(ConnectionError::TableFull))
    ));
    let closed = table.delete(2).unwrap();
    let reopened = table.create(Role::StationClient, 99).unwrap();
    assert_ne!(closed, reopened);
    assert_eq!(table.lookup_socket(reopened), Some(99));
}

#[test]
fn lifecycle_events_reach_subscribers() {
    let (bus, table) = table();
    let listener = bus.listen(table.event_type()).unwrap();
    let id = table.create(Role::AccessPointClient, 5).unwrap();
    table.delete(5).unwrap();
    let events: Vec<_> = std::iter::from_fn(|| listener.try_receive())
        .filter_map(|m| m.value().and_then(ConnectionEvent::from_u32))
        .collect();
    assert_eq!(events, [ConnectionEvent::Connected, ConnectionEvent::Disconnected]);
    assert_eq!(table.lookup_socket(id), None);
}

#[test]
fn shutdown_by_role_closes_only_that_role() {
    let (_bus, table) = table();
    table.create(Role::AccessPointClient, 1).unwrap();
    table.create(Role::StationClient, 2).unwrap();
    table.create(Role::AccessPointClient, 3).unwrap();
    for socket in table.sockets(Role::AccessPointClient) {
        table.delete(socket).unwrap();
    }
    assert_eq!(table.count(), 1);
    assert!(table.lookup_by_socket(2).is_some());
}

#[test]
fn concurrent_open_close_keeps_ids_unique() {
    let (_bus, table) = table();
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let mut seen = Vec::new();
                for _ in 0..50 {
                    if let Ok(id) = table.create(Role::StationClient, t) {
                        seen.push(id.get());
                        let _ = table.delete(t);
                    }
                }
                seen
            })
        })
        .collect();
    let mut all: Vec<u32> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    let total = all.len();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), total);
    assert_eq!(table.count(), 0);
}

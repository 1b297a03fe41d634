//! Radio controller flows against the recording mocks.

use audio_firmware::connection::Role;
use audio_firmware::wlan::{Internal, RadioState, WlanEvent};

use crate::mock_hw::{Call, PERIOD, Rig};

fn home_rig() -> Rig {
    Rig::new(
        &[("Home", "password1")],
        &[("Cafe", "", -70), ("Home", "password1", -40)],
    )
}

#[test]
fn boot_joins_known_network() {
    let mut rig = home_rig();
    rig.boot();

    assert_eq!(
        rig.journal.calls(),
        vec![
            Call::StartStation,
            Call::Arm(PERIOD),
            Call::Scan,
            Call::Connect("Home".into()),
            Call::Disarm,
            Call::TransportStart(Role::StationClient),
        ]
    );
    assert_eq!(
        rig.published(),
        vec![WlanEvent::ScanStarted, WlanEvent::ScanStopped, WlanEvent::Connected]
    );
    assert_eq!(rig.controller.state(), RadioState::StationConnected);
    assert!(!rig.controller.reconnect_armed());
}

#[test]
fn scan_results_are_kept_for_readers() {
    let mut rig = home_rig();
    rig.boot();
    let results = rig.scan.try_get().unwrap();
    let ssids: Vec<&str> = results.iter().map(|r| r.ssid.as_str()).collect();
    assert_eq!(ssids, ["Cafe", "Home"]);
}

#[test]
fn unknown_networks_wait_for_the_timer() {
    let mut rig = Rig::new(&[], &[("Cafe", "", -70)]);
    rig.boot();

    assert_eq!(rig.journal.count(&Call::Arm(PERIOD)), 1);
    assert_eq!(rig.journal.count(&Call::Scan), 1);
    assert!(rig.journal.position(&Call::Connect("Cafe".into())).is_none());
    assert_eq!(rig.controller.state(), RadioState::StationDisconnected);
    assert!(rig.controller.reconnect_armed());

    rig.post(Internal::ReconnectTimer);
    assert_eq!(rig.journal.count(&Call::Arm(PERIOD)), 2);
    assert_eq!(rig.journal.count(&Call::Scan), 2);
    assert!(rig.controller.reconnect_armed());
}

#[test]
fn timer_rearms_once_per_cycle() {
    let mut rig = Rig::new(&[], &[]);
    rig.boot();
    for cycle in 2..=5 {
        rig.published();
        rig.post(Internal::ReconnectTimer);
        assert_eq!(rig.journal.count(&Call::Arm(PERIOD)), cycle);
    }
    assert_eq!(rig.journal.count(&Call::Disarm), 0);
}

#[test]
fn rejected_key_does_not_double_arm() {
    let mut rig = Rig::new(&[("Home", "wrongpass1")], &[("Home", "password1", -40)]);
    rig.boot();

    // The failed association reports a disconnect while the timer is
    // already armed; no second scan until it fires.
    assert_eq!(rig.journal.count(&Call::Arm(PERIOD)), 1);
    assert_eq!(rig.journal.count(&Call::Connect("Home".into())), 1);
    assert_eq!(rig.journal.count(&Call::TransportStop), 1);
    assert_eq!(rig.controller.state(), RadioState::StationDisconnected);

    rig.post(Internal::ReconnectTimer);
    assert_eq!(rig.journal.count(&Call::Connect("Home".into())), 2);
}

#[test]
fn link_loss_reconnects_immediately() {
    let mut rig = home_rig();
    rig.boot();
    rig.published();
    rig.journal.clear();

    rig.post(Internal::StationDisconnected);

    assert_eq!(
        rig.journal.calls(),
        vec![
            Call::TransportStop,
            Call::Arm(PERIOD),
            Call::Scan,
            Call::Connect("Home".into()),
            Call::Disarm,
            Call::TransportStart(Role::StationClient),
        ]
    );
    assert_eq!(
        rig.published(),
        vec![
            WlanEvent::Disconnected,
            WlanEvent::ScanStarted,
            WlanEvent::ScanStopped,
            WlanEvent::Connected,
        ]
    );
}

#[test]
fn timer_after_connect_does_nothing() {
    let mut rig = home_rig();
    rig.boot();
    rig.journal.clear();
    rig.post(Internal::ReconnectTimer);
    rig.post(Internal::RequestReconnect);
    assert!(rig.journal.calls().is_empty());
}

#[test]
fn toggle_from_station_stops_transport_first() {
    let mut rig = home_rig();
    rig.boot();
    rig.published();
    rig.journal.clear();

    rig.toggle();

    assert_eq!(
        rig.journal.calls(),
        vec![
            Call::TransportStop,
            Call::Disarm,
            Call::StopStation,
            Call::StartAccessPoint,
        ]
    );
    assert_eq!(
        rig.published(),
        vec![WlanEvent::Disconnected, WlanEvent::ApStarted]
    );
    assert_eq!(rig.controller.state(), RadioState::AccessPointIdle);
    assert!(!rig.controller.reconnect_armed());
}

#[test]
fn access_point_serves_while_a_client_is_attached() {
    let mut rig = home_rig();
    rig.boot();
    rig.toggle();
    rig.published();
    rig.journal.clear();

    rig.post(Internal::ApClientAttached);
    assert_eq!(rig.journal.calls(), vec![Call::TransportStart(Role::AccessPointClient)]);
    assert_eq!(rig.controller.state(), RadioState::AccessPointClientAttached);
    assert_eq!(rig.controller.handle().ap_clients(), 1);

    rig.post(Internal::ApClientDetached);
    assert_eq!(rig.journal.calls().last(), Some(&Call::TransportStop));
    assert_eq!(rig.controller.state(), RadioState::AccessPointIdle);
    assert_eq!(
        rig.published(),
        vec![WlanEvent::ApClientConnected, WlanEvent::ApClientDisconnected]
    );
}

#[test]
fn transport_stays_up_until_last_client_leaves() {
    let mut rig = home_rig();
    rig.boot();
    rig.toggle();
    rig.journal.clear();

    rig.post(Internal::ApClientAttached);
    rig.post(Internal::ApClientAttached);
    rig.post(Internal::ApClientDetached);
    assert_eq!(rig.journal.count(&Call::TransportStart(Role::AccessPointClient)), 1);
    assert_eq!(rig.journal.count(&Call::TransportStop), 0);

    rig.post(Internal::ApClientDetached);
    assert_eq!(rig.journal.count(&Call::TransportStop), 1);
}

#[test]
fn toggle_back_orders_client_loss_before_ap_stop() {
    let mut rig = home_rig();
    rig.boot();
    rig.toggle();
    rig.post(Internal::ApClientAttached);
    rig.published();
    rig.journal.clear();

    rig.toggle();

    let calls = rig.journal.calls();
    let stop_transport = rig.journal.position(&Call::TransportStop).unwrap();
    let stop_ap = rig.journal.position(&Call::StopAccessPoint).unwrap();
    let start_sta = rig.journal.position(&Call::StartStation).unwrap();
    assert!(stop_transport < stop_ap && stop_ap < start_sta, "{:?}", calls);

    let events = rig.published();
    assert_eq!(
        &events[..2],
        &[WlanEvent::ApClientDisconnected, WlanEvent::ApStopped]
    );
    assert_eq!(events.last(), Some(&WlanEvent::Connected));
    assert_eq!(rig.controller.handle().ap_clients(), 0);
    assert_eq!(rig.controller.state(), RadioState::StationConnected);
}

#[test]
fn driver_events_for_the_other_mode_are_ignored() {
    let mut rig = home_rig();
    rig.boot();
    rig.published();
    rig.journal.clear();

    rig.post(Internal::ApClientAttached);
    rig.post(Internal::AccessPointStarted);
    assert!(rig.journal.calls().is_empty());
    assert!(rig.published().is_empty());

    rig.toggle();
    rig.journal.clear();
    rig.post(Internal::GotIp);
    rig.post(Internal::StationDisconnected);
    assert!(rig.journal.calls().is_empty());
    assert_eq!(rig.controller.state(), RadioState::AccessPointIdle);
}

#[test]
fn status_is_visible_through_the_handle() {
    let mut rig = home_rig();
    let handle = rig.controller.handle();
    assert_eq!(handle.state(), RadioState::StationDisconnected);
    rig.boot();
    assert_eq!(handle.state(), RadioState::StationConnected);
    rig.toggle();
    assert_eq!(handle.state(), RadioState::AccessPointIdle);
}

#[test]
fn full_internal_queue_falls_back_to_the_timer() {
    use audio_firmware::config::LISTENER_DEPTH;

    let mut rig = home_rig();
    rig.boot();
    rig.published();
    rig.journal.clear();

    let handle = rig.controller.handle();
    for _ in 0..LISTENER_DEPTH {
        handle.driver_event(Internal::ApClientDetached).unwrap();
    }
    assert!(handle.driver_event(Internal::ApClientDetached).is_err());

    rig.controller.handle_event(Internal::StationDisconnected);
    assert_eq!(rig.journal.calls(), vec![Call::TransportStop, Call::Arm(PERIOD)]);
    assert!(rig.controller.reconnect_armed());

    // The queued notifications are ignored in station mode.
    rig.settle();
    assert_eq!(rig.controller.state(), RadioState::StationDisconnected);

    rig.post(Internal::ReconnectTimer);
    assert_eq!(rig.controller.state(), RadioState::StationConnected);
    assert_eq!(rig.journal.count(&Call::Connect("Home".into())), 1);
}

//! JSON-RPC over the bus: frames in, responses out through the transport.

use std::sync::Arc;
use std::time::Duration;

use audio_firmware::bus::MessageType;
use audio_firmware::config::SystemConfig;
use audio_firmware::connection::{ConnectionId, ConnectionTable, Role};
use audio_firmware::rpc::methods::{MethodContext, build_engine};
use audio_firmware::rpc::{RpcService, WsFrame};
use audio_firmware::wlan::RadioState;

use crate::mock_hw::{Call, Journal, MockTransport, Rig};

struct RpcRig {
    radio: Rig,
    connections: Arc<ConnectionTable>,
    frames: MessageType,
    service: RpcService<Arc<MockTransport>>,
    sent: Journal,
}

impl RpcRig {
    fn new() -> Self {
        let radio = Rig::new(&[("Home", "password1")], &[("Home", "password1", -40)]);
        let bus = Arc::clone(&radio.bus);
        let connections =
            Arc::new(ConnectionTable::new(Arc::clone(&bus), Duration::from_millis(10)).unwrap());
        let frames = bus.register_type().unwrap();
        let engine = build_engine(&MethodContext {
            wlan: radio.controller.handle(),
            scan: Arc::clone(&radio.scan),
            connections: Arc::clone(&connections),
            config: SystemConfig::default(),
        });
        let sent = Journal::default();
        let service = RpcService::new(
            &bus,
            frames,
            engine,
            Arc::new(MockTransport::new(sent.clone())),
        )
        .unwrap();
        Self {
            radio,
            connections,
            frames,
            service,
            sent,
        }
    }

    /// Deliver `text` as if the transport received it on `socket`.
    fn receive(&self, socket: i32, text: &str) -> ConnectionId {
        let connection = self
            .connections
            .lookup_by_socket(socket)
            .unwrap_or_else(|| self.connections.create(Role::StationClient, socket).unwrap());
        self.radio
            .bus
            .send_payload(
                self.frames,
                WsFrame {
                    connection,
                    text: text.into(),
                },
            )
            .unwrap();
        self.service.poll();
        connection
    }

    fn replies(&self) -> Vec<(u32, String)> {
        self.sent
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send(id, text) => Some((id, text)),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn reply_goes_to_the_originating_connection() {
    let rig = RpcRig::new();
    let a = rig.receive(40, r#"{"jsonrpc":"2.0","method":"con.count","id":1}"#);
    let b = rig.receive(41, r#"{"jsonrpc":"2.0","method":"con.count","id":2}"#);
    assert_eq!(
        rig.replies(),
        vec![
            (a.get(), r#"{"jsonrpc":"2.0","result":1,"id":1}"#.to_owned()),
            (b.get(), r#"{"jsonrpc":"2.0","result":2,"id":2}"#.to_owned()),
        ]
    );
}

#[test]
fn every_malformed_frame_gets_an_error_response() {
    let rig = RpcRig::new();
    rig.receive(40, "{");
    rig.receive(40, r#"[1,2]"#);
    rig.receive(40, r#"{"jsonrpc":"2.0","method":"nope","id":12}"#);
    rig.receive(40, r#"{"jsonrpc":"2.0","method":"con.count","id":"str"}"#);
    rig.receive(40, r#"{"jsonrpc":"2.0","method":"con.count","params":[1],"id":13}"#);

    let texts: Vec<String> = rig.replies().into_iter().map(|(_, t)| t).collect();
    assert_eq!(
        texts,
        vec![
            r#"{"jsonrpc":"2.0","error":{"code":-32700,"message":"parse error"},"id":null}"#,
            r#"{"jsonrpc":"2.0","error":{"code":-32600,"message":"invalid request"},"id":null}"#,
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"method not found"},"id":12}"#,
            r#"{"jsonrpc":"2.0","error":{"code":-32600,"message":"invalid request"},"id":null}"#,
            r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"invalid params"},"id":13}"#,
        ]
    );
}

#[test]
fn toggle_over_rpc_switches_the_radio() {
    let mut rig = RpcRig::new();
    rig.radio.boot();
    assert_eq!(rig.radio.controller.state(), RadioState::StationConnected);

    rig.receive(40, r#"{"jsonrpc":"2.0","method":"wlan.toggle_mode","id":3}"#);
    rig.radio.settle();
    assert_eq!(rig.radio.controller.state(), RadioState::AccessPointIdle);

    rig.receive(40, r#"{"jsonrpc":"2.0","method":"wlan.status","id":4}"#);
    assert_eq!(
        rig.replies().last().map(|(_, t)| t.as_str()),
        Some(
            r#"{"jsonrpc":"2.0","result":{"ap_clients":0,"mode":"access_point","state":"access_point_idle"},"id":4}"#
        )
    );
}

#[test]
fn scan_results_over_rpc() {
    let mut rig = RpcRig::new();
    rig.radio.boot();
    rig.receive(40, r#"{"jsonrpc":"2.0","method":"wlan.scan_results","id":5}"#);
    assert_eq!(
        rig.replies()[0].1,
        r#"{"jsonrpc":"2.0","result":[{"rssi":-40,"ssid":"Home"}],"id":5}"#
    );
}

#[test]
fn large_and_negative_ids_are_echoed() {
    let rig = RpcRig::new();
    rig.receive(40, r#"{"jsonrpc":"2.0","method":"con.count","id":4294967296}"#);
    rig.receive(40, r#"{"jsonrpc":"2.0","method":"nope","id":-7}"#);
    let texts: Vec<String> = rig.replies().into_iter().map(|(_, t)| t).collect();
    assert!(texts[0].ends_with(r#""id":4294967296}"#));
    assert!(texts[1].ends_with(r#""id":-7}"#));
}

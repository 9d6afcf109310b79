// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! End-to-end tests against a scripted FPM peer.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use ipnet::IpNet;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::Decoder;

use fpm_wire::message::{AttrIter, NlMsgHdr, NlMsgWriter, RtMsg, NLMSG_HDRLEN, RTMSG_LEN};
use fpm_wire::rtnl;
use fpm_wire::FpmFrameCodec;

use fpm_plugin::{
    CtxStatus, DplaneCtx, DplaneOp, EngineHandle, EngineTables, FpmParamsBuilder, FpmPlugin,
    FpmProvider, LspCtx, LspNexthop, MacCtx, Nexthop, NexthopCtx, ProviderIo, RouteCtx, Srv6Info,
};

const FAST_RETRY: Duration = Duration::from_millis(100);

fn net(s: &str) -> IpNet {
    s.parse().unwrap()
}

fn params() -> FpmParamsBuilder {
    let mut builder = FpmParamsBuilder::default();
    builder
        .reconnect_delay(FAST_RETRY)
        .rib_resume_delay(Duration::from_millis(50));
    builder
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn start_plugin(
    tables: EngineTables,
    builder: &mut FpmParamsBuilder,
) -> (FpmPlugin, EngineHandle, TcpListener) {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let engine = EngineHandle::new(tables);
    let params = builder.address(listener.local_addr().unwrap()).build().unwrap();
    let plugin = FpmPlugin::register(params, engine.clone()).unwrap();
    (plugin, engine, listener)
}

async fn accept(listener: &TcpListener) -> TcpStream {
    let (sock, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("peer accept timed out")
        .unwrap();
    sock
}

/// Read until `want` frames arrived or `overall` elapsed.
async fn read_frames(sock: &mut TcpStream, want: usize, overall: Duration) -> Vec<Bytes> {
    let mut buf = BytesMut::new();
    let mut frames = Vec::new();
    let deadline = std::time::Instant::now() + overall;
    while frames.len() < want {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, sock.read_buf(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
            Ok(Ok(_)) => {
                while let Ok(Some(frame)) = FpmFrameCodec.decode(&mut buf) {
                    frames.push(frame);
                }
            }
        }
    }
    frames
}

fn msg_type(frame: &Bytes) -> u16 {
    NlMsgHdr::parse(frame).unwrap().msg_type
}

fn family(frame: &Bytes) -> u8 {
    frame[NLMSG_HDRLEN]
}

fn dst_attr(frame: &Bytes) -> Option<Vec<u8>> {
    AttrIter::new(&frame[NLMSG_HDRLEN + RTMSG_LEN..])
        .find(|(ty, _)| *ty == rtnl::RTA_DST)
        .map(|(_, payload)| payload.to_vec())
}

fn tick(provider: &FpmProvider, ctxs: Vec<DplaneCtx>) -> bool {
    let mut io = ProviderIo::new(128);
    io.input = VecDeque::from(ctxs);
    provider.process(&mut io)
}

fn sample_tables() -> EngineTables {
    let mut tables = EngineTables::new();
    tables.add_vrf(0, "default", 254);
    tables.install_lsp(LspCtx {
        in_label: 100,
        nexthops: vec![LspNexthop {
            out_labels: vec![200],
            gateway: "10.1.1.2".parse().unwrap(),
            ifindex: 3,
        }],
    });
    tables.install_nhg(NexthopCtx {
        id: 10,
        nexthop: Nexthop::gateway("192.0.2.1".parse().unwrap(), 7),
        ..NexthopCtx::default()
    });
    let mut r1 = RouteCtx::new(net("10.0.0.0/24"), 5, 5);
    r1.nexthops.push(Nexthop::gateway("192.0.2.1".parse().unwrap(), 7));
    tables.install_route(r1);
    let mut r2 = RouteCtx::new(net("10.0.1.0/24"), 5, 5);
    r2.nexthops.push(Nexthop::gateway("192.0.2.1".parse().unwrap(), 7));
    tables.install_route(r2);
    tables.install_rmac(
        1000,
        MacCtx {
            mac: [0, 0x11, 0x22, 0x33, 0x44, 0x55],
            vtep_ip: "203.0.113.9".parse().unwrap(),
            vxlan_ifindex: 12,
            bridge_ifindex: 4,
            vid: 100,
            sticky: false,
        },
    );
    tables
}

#[tokio::test]
async fn empty_tables_send_nothing() {
    let (plugin, _engine, listener) = start_plugin(EngineTables::new(), &mut params()).await;
    let mut peer = accept(&listener).await;

    let frames = read_frames(&mut peer, 1, Duration::from_millis(400)).await;
    assert!(frames.is_empty(), "unexpected frames: {frames:?}");

    let counters = plugin.ctl().counters();
    assert_eq!(counters.bytes_sent, 0);
    drop(plugin);
}

#[tokio::test]
async fn replay_covers_all_tables_in_order() {
    let (plugin, _engine, listener) = start_plugin(sample_tables(), &mut params()).await;
    let mut peer = accept(&listener).await;

    let frames = read_frames(&mut peer, 5, Duration::from_secs(3)).await;
    assert_eq!(frames.len(), 5, "expected a full replay");

    // strict order: LSP, NHG, RIB (two routes), RMAC
    assert_eq!(msg_type(&frames[0]), rtnl::RTM_NEWROUTE);
    assert_eq!(family(&frames[0]), rtnl::AF_MPLS);
    assert_eq!(msg_type(&frames[1]), rtnl::RTM_NEWNEXTHOP);
    assert_eq!(msg_type(&frames[2]), rtnl::RTM_NEWROUTE);
    assert_eq!(family(&frames[2]), rtnl::AF_INET);
    assert_eq!(msg_type(&frames[3]), rtnl::RTM_NEWROUTE);
    assert_eq!(family(&frames[3]), rtnl::AF_INET);
    assert_eq!(msg_type(&frames[4]), rtnl::RTM_NEWNEIGH);

    // routes replay in table iteration order
    assert_eq!(dst_attr(&frames[2]).unwrap(), vec![10, 0, 0, 0]);
    assert_eq!(dst_attr(&frames[3]).unwrap(), vec![10, 0, 1, 0]);

    let total: u32 = frames.iter().map(|f| f.len() as u32 + 4).sum();
    let counters = plugin.ctl().counters();
    assert_eq!(counters.bytes_sent, total);
    drop(plugin);
}

#[tokio::test]
async fn steady_state_update_emits_delete_then_install() {
    let (plugin, engine, listener) = start_plugin(EngineTables::new(), &mut params()).await;
    let provider = plugin.provider();
    let mut peer = accept(&listener).await;

    // drain the (empty) replay and give the session time to settle
    let _ = read_frames(&mut peer, 1, Duration::from_millis(300)).await;

    let mut route = RouteCtx::new(net("10.9.0.0/16"), 5, 5);
    route.nexthops.push(Nexthop::gateway("192.0.2.1".parse().unwrap(), 7));
    tick(&provider, vec![DplaneCtx::route(DplaneOp::RouteUpdate, route)]);

    let frames = read_frames(&mut peer, 2, Duration::from_secs(2)).await;
    assert_eq!(frames.len(), 2);
    assert_eq!(msg_type(&frames[0]), rtnl::RTM_DELROUTE);
    assert_eq!(msg_type(&frames[1]), rtnl::RTM_NEWROUTE);

    // the context came back to the engine marked successful
    let completed = engine.drain_completed();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].status, CtxStatus::Success);
    drop(plugin);
}

#[tokio::test]
async fn peer_close_triggers_reconnect_and_full_replay() {
    let (plugin, _engine, listener) = start_plugin(sample_tables(), &mut params()).await;

    let mut peer = accept(&listener).await;
    let first = read_frames(&mut peer, 5, Duration::from_secs(3)).await;
    assert_eq!(first.len(), 5);
    drop(peer);

    // the session notices EOF, resets and retries after the backoff
    let mut peer = accept(&listener).await;
    let second = read_frames(&mut peer, 5, Duration::from_secs(3)).await;
    assert_eq!(second.len(), 5, "expected a full replay after reconnect");

    let counters = plugin.ctl().counters();
    assert!(counters.connection_closes >= 1);
    drop(plugin);
}

#[tokio::test]
async fn nhg_toggle_reconnects_and_respects_policy() {
    let mut tables = EngineTables::new();
    tables.install_nhg(NexthopCtx {
        id: 10,
        nexthop: Nexthop::gateway("192.0.2.1".parse().unwrap(), 7),
        ..NexthopCtx::default()
    });
    let mut route = RouteCtx::new(net("10.0.0.0/24"), 5, 5);
    route.nhg_id = 10;
    route.nexthops.push(Nexthop::gateway("192.0.2.1".parse().unwrap(), 7));
    tables.install_route(route);

    let (plugin, _engine, listener) = start_plugin(tables, &mut params()).await;
    let ctl = plugin.ctl();

    let mut peer = accept(&listener).await;
    let frames = read_frames(&mut peer, 2, Duration::from_secs(3)).await;
    let types: Vec<u16> = frames.iter().map(msg_type).collect();
    assert!(types.contains(&rtnl::RTM_NEWNEXTHOP));
    assert!(types.contains(&rtnl::RTM_NEWROUTE));

    // disabling nexthop groups reconnects and replays without them
    ctl.use_nhg(false).unwrap();
    let mut peer = accept(&listener).await;
    let frames = read_frames(&mut peer, 1, Duration::from_secs(3)).await;
    let types: Vec<u16> = frames.iter().map(msg_type).collect();
    assert_eq!(types, vec![rtnl::RTM_NEWROUTE]);

    // toggling twice restores the original frame set
    ctl.use_nhg(true).unwrap();
    let mut peer = accept(&listener).await;
    let frames = read_frames(&mut peer, 2, Duration::from_secs(3)).await;
    let types: Vec<u16> = frames.iter().map(msg_type).collect();
    assert!(types.contains(&rtnl::RTM_NEWNEXTHOP));
    assert!(types.contains(&rtnl::RTM_NEWROUTE));
    drop(plugin);
}

#[tokio::test]
async fn buffer_full_suspends_and_resumes_without_duplicates() {
    let mut tables = EngineTables::new();
    for i in 0..16u8 {
        let mut route = RouteCtx::new(format!("10.0.{i}.0/24").parse().unwrap(), 5, 5);
        route.nexthops.push(Nexthop::gateway("192.0.2.1".parse().unwrap(), 7));
        tables.install_route(route);
    }

    // an output buffer this small forces the RIB walk to suspend
    let mut builder = params();
    builder.obuf_capacity(256);
    let (plugin, _engine, listener) = start_plugin(tables, &mut builder).await;
    let mut peer = accept(&listener).await;

    let frames = read_frames(&mut peer, 16, Duration::from_secs(5)).await;
    assert_eq!(frames.len(), 16);

    let dsts: Vec<Vec<u8>> = frames.iter().map(|f| dst_attr(f).unwrap()).collect();
    let unique: std::collections::HashSet<_> = dsts.iter().cloned().collect();
    assert_eq!(unique.len(), dsts.len(), "a route was replayed twice");

    let counters = plugin.ctl().counters();
    assert!(counters.buffer_full >= 1, "walk never hit buffer-full");
    drop(plugin);
}

#[tokio::test]
async fn lo_address_change_resends_srv6_vpn_routes() {
    let mut tables = EngineTables::new();
    tables.add_interface("lo", 1, vec![net("2001:db8:1::1/128")]);
    let mut plain = RouteCtx::new(net("10.0.0.0/24"), 5, 5);
    plain.nexthops.push(Nexthop::gateway("192.0.2.1".parse().unwrap(), 7));
    tables.install_route(plain);
    let mut vpn = RouteCtx::new(net("2001:db8:100::/64"), 5, 5);
    vpn.nexthops.push(Nexthop {
        srv6: Some(Srv6Info {
            seg6_segs: "fc00::1".parse().unwrap(),
            ..Srv6Info::default()
        }),
        ..Nexthop::default()
    });
    tables.install_route(vpn);

    let (plugin, _engine, listener) = start_plugin(tables, &mut params()).await;
    let provider = plugin.provider();
    let mut peer = accept(&listener).await;

    let replay = read_frames(&mut peer, 2, Duration::from_secs(3)).await;
    assert_eq!(replay.len(), 2);

    // an address change on "lo" re-sends only the SRv6 VPN routes
    tick(
        &provider,
        vec![DplaneCtx::addr(
            DplaneOp::AddrInstall,
            fpm_plugin::AddrCtx {
                ifname: "lo".to_string(),
                address: net("2001:db8:1::2/128"),
            },
        )],
    );

    let frames = read_frames(&mut peer, 1, Duration::from_secs(2)).await;
    assert_eq!(frames.len(), 1);
    let attrs: Vec<u16> = AttrIter::new(&frames[0][NLMSG_HDRLEN + RTMSG_LEN..])
        .map(|(ty, _)| ty)
        .collect();
    assert!(attrs.contains(&rtnl::RTA_ENCAP));

    // and nothing else follows
    let extra = read_frames(&mut peer, 1, Duration::from_millis(300)).await;
    assert!(extra.is_empty());
    drop(plugin);
}

#[tokio::test]
async fn inbound_route_notifications_reach_the_engine() {
    let (plugin, engine, listener) = start_plugin(EngineTables::new(), &mut params()).await;
    let mut peer = accept(&listener).await;

    let mut w = NlMsgWriter::new(4096, rtnl::RTM_NEWROUTE, rtnl::NLM_F_REQUEST);
    w.put_rtmsg(RtMsg {
        family: rtnl::AF_INET,
        dst_len: 24,
        table: 5,
        protocol: rtnl::RTPROT_BGP,
        ..RtMsg::default()
    })
    .unwrap();
    w.put_attr(rtnl::RTA_DST, &[10, 1, 2, 0]).unwrap();
    let msg = w.finish();

    let mut framed = BytesMut::new();
    tokio_util::codec::Encoder::encode(&mut FpmFrameCodec, &msg[..], &mut framed).unwrap();
    peer.write_all(&framed).await.unwrap();
    peer.flush().await.unwrap();

    // poll the engine for the decoded notification
    let mut notifications = Vec::new();
    for _ in 0..50 {
        notifications = engine.drain_notifications();
        if !notifications.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].op, DplaneOp::RouteNotify);

    let counters = plugin.ctl().counters();
    assert!(counters.bytes_read > 0);
    drop(plugin);
}

#[tokio::test]
async fn malformed_frame_header_forces_reconnect() {
    let (plugin, _engine, listener) = start_plugin(EngineTables::new(), &mut params()).await;
    let mut peer = accept(&listener).await;

    // bad version byte: the plugin must drop the connection and retry
    peer.write_all(&[2u8, 1, 0, 4]).await.unwrap();
    peer.flush().await.unwrap();

    let reconnected = accept(&listener).await;
    drop(reconnected);
    drop(peer);
    drop(plugin);
}

#[tokio::test]
async fn disconnected_contexts_complete_immediately() {
    // no address: the plugin stays disabled
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    drop(listener);
    let engine = EngineHandle::new(EngineTables::new());
    let params = params().build().unwrap();
    let plugin = FpmPlugin::register(params, engine.clone()).unwrap();
    let provider = plugin.provider();

    let mut route = RouteCtx::new(net("10.0.0.0/24"), 5, 5);
    route.nexthops.push(Nexthop::gateway("192.0.2.1".parse().unwrap(), 7));
    let hit_limit = tick(&provider, vec![DplaneCtx::route(DplaneOp::RouteInstall, route)]);
    assert!(!hit_limit);

    let completed = engine.drain_completed();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].status, CtxStatus::Success);

    let counters = plugin.ctl().counters();
    assert_eq!(counters.ctxqueue_len, 0);
    assert_eq!(counters.bytes_sent, 0);
    drop(plugin);
}

#[tokio::test]
async fn running_config_reflects_state() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let engine = EngineHandle::new(EngineTables::new());
    let plugin = FpmPlugin::register(params().build().unwrap(), engine).unwrap();
    let ctl = plugin.ctl();

    // disabled: nothing to render
    assert_eq!(ctl.running_config(), "");

    let addr = listener.local_addr().unwrap();
    ctl.set_address(addr.ip(), Some(addr.port())).unwrap();
    ctl.use_nhg(false).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let config = ctl.running_config();
    assert!(config.contains(&format!("fpm address 127.0.0.1 port {}", addr.port())));
    assert!(config.contains("no fpm use-next-hop-groups"));

    ctl.reset_counters().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctl.counters().user_configures, 0);
    drop(plugin);
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The plugin thread: connection state machine, socket I/O and event
//! dispatch.
//!
//! A dedicated OS thread hosts a current-thread tokio runtime running one
//! [`FpmSession`]. The session owns the socket, the inbound buffer and all
//! timers; everything shared with the engine thread ([`FpmCore`]) sits
//! behind mutexes or atomics. Control flow follows the connection state
//! machine: `Disabled -> Idle -> Connecting -> Connected`, with the replay
//! walker running right after each successful connect.

mod notify;
mod walker;

use std::io;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::Interest;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::Decoder;
use tracing::{debug, error, info, warn};

use fpm_wire::message::{NlMsgHdr, NLMSG_HDRLEN};
use fpm_wire::rtnl;
use fpm_wire::{FpmFrameCodec, FPM_HEADER_SIZE};

use crate::ctx::{CtxBody, DplaneCtx, DplaneOp, CtxStatus};
use crate::encode::{encode_ctx, EncodeOpts};
use crate::engine::{EngineHandle, EngineTables};
use crate::events::FpmEvent;
use crate::obuf::{BufferFull, OutputBuffer};
use crate::plugin::FpmParams;
use crate::queue::CtxQueue;
use crate::stats::FpmCounters;
use crate::NL_PKT_BUF_SIZE;

use walker::WalkState;

/// Messages delivered to the plugin thread. Control events share the
/// channel with connect completions so that dispatch stays single-threaded.
#[derive(Debug)]
pub(crate) enum SessionMsg {
    Event(FpmEvent),
    ConnectDone(io::Result<TcpStream>),
    Shutdown,
}

/// Published connection state, readable from any thread.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub(crate) enum SockState {
    Disabled = 0,
    Idle = 1,
    Connecting = 2,
    Connected = 3,
}

/// State shared between the engine thread and the plugin thread.
#[derive(Debug)]
pub(crate) struct FpmCore {
    pub(crate) counters: FpmCounters,
    pub(crate) obuf: Mutex<OutputBuffer>,
    pub(crate) ctxqueue: CtxQueue,
    /// Armed by `enqueue` so the session starts draining `obuf`.
    pub(crate) write_ready: Notify,
    /// Armed by the provider so the session runs `process_queue`.
    pub(crate) dequeue_ready: Notify,
    pub(crate) engine: EngineHandle,
    pub(crate) tx: UnboundedSender<SessionMsg>,
    state: AtomicU8,
    use_nhg: AtomicBool,
    disabled: AtomicBool,
    address: Mutex<Option<SocketAddr>>,
    v6_replace_semantics: bool,
}

impl FpmCore {
    pub(crate) fn new(
        params: &FpmParams,
        engine: EngineHandle,
        tx: UnboundedSender<SessionMsg>,
    ) -> Self {
        FpmCore {
            counters: FpmCounters::default(),
            obuf: Mutex::new(OutputBuffer::new(params.obuf_capacity)),
            ctxqueue: CtxQueue::default(),
            write_ready: Notify::new(),
            dequeue_ready: Notify::new(),
            engine,
            tx,
            state: AtomicU8::new(SockState::Disabled as u8),
            use_nhg: AtomicBool::new(params.use_nhg),
            disabled: AtomicBool::new(true),
            address: Mutex::new(None),
            v6_replace_semantics: params.v6_replace_semantics,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state.load(Ordering::Relaxed) == SockState::Connected as u8
    }

    pub(crate) fn use_nhg(&self) -> bool {
        self.use_nhg.load(Ordering::Relaxed)
    }

    pub(crate) fn disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    pub(crate) fn address(&self) -> Option<SocketAddr> {
        *self.address.lock().unwrap()
    }

    fn encode_opts(&self) -> EncodeOpts {
        EncodeOpts {
            use_nhg: self.use_nhg(),
            v6_replace_semantics: self.v6_replace_semantics,
        }
    }

    /// Encode a context and frame it into the output buffer.
    ///
    /// Returns `Ok(true)` when something was queued, `Ok(false)` when the
    /// operation produced nothing (ignored kind, suppressed, encode
    /// failure). `BufferFull` leaves the buffer untouched so the caller can
    /// suspend and retry.
    pub(crate) fn enqueue(
        &self,
        tables: &EngineTables,
        ctx: &DplaneCtx,
    ) -> Result<bool, BufferFull> {
        let msgs = match encode_ctx(tables, ctx, self.encode_opts()) {
            Ok(msgs) => msgs,
            Err(e) => {
                error!("failed to encode {:?} operation: {e}", ctx.op);
                return Ok(false);
            }
        };
        if msgs.is_empty() {
            return Ok(false);
        }

        let queued = {
            let mut obuf = self.obuf.lock().unwrap();
            let wanted: usize = msgs.iter().map(|m| m.len() + FPM_HEADER_SIZE).sum();
            match obuf.push_frames(&msgs) {
                Ok(bytes) => bytes,
                Err(full) => {
                    FpmCounters::add(&self.counters.buffer_full, 1);
                    debug!(
                        "buffer full: wants to write {wanted} but has {}",
                        obuf.writable()
                    );
                    return Err(full);
                }
            }
        };

        FpmCounters::add(&self.counters.obuf_bytes, queued);
        FpmCounters::raise_peak(
            &self.counters.obuf_peak,
            FpmCounters::get(&self.counters.obuf_bytes),
        );
        self.write_ready.notify_one();
        Ok(true)
    }
}

/// The session state owned by the plugin thread.
pub(crate) struct FpmSession {
    core: Arc<FpmCore>,
    rx: UnboundedReceiver<SessionMsg>,
    reconnect_delay: Duration,
    rib_resume_delay: Duration,

    address: Option<SocketAddr>,
    disabled: bool,
    sock: Option<TcpStream>,
    ibuf: BytesMut,
    connect_task: Option<JoinHandle<()>>,
    connect_at: Option<Instant>,
    dequeue_at: Option<Instant>,
    walk: WalkState,
}

impl FpmSession {
    pub(crate) fn new(
        core: Arc<FpmCore>,
        rx: UnboundedReceiver<SessionMsg>,
        params: &FpmParams,
    ) -> Self {
        FpmSession {
            core,
            rx,
            reconnect_delay: params.reconnect_delay,
            rib_resume_delay: params.rib_resume_delay,
            address: None,
            disabled: true,
            sock: None,
            ibuf: BytesMut::with_capacity(NL_PKT_BUF_SIZE),
            connect_task: None,
            connect_at: None,
            dequeue_at: None,
            walk: WalkState::default(),
        }
    }

    async fn sleep_opt(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    async fn sock_ready(sock: &Option<TcpStream>, want_write: bool) -> io::Result<tokio::io::Ready> {
        match sock {
            Some(sock) => {
                let interest = if want_write {
                    Interest::READABLE | Interest::WRITABLE
                } else {
                    Interest::READABLE
                };
                sock.ready(interest).await
            }
            None => std::future::pending().await,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let want_write = self.core.obuf.lock().unwrap().pending() > 0;
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    None | Some(SessionMsg::Shutdown) => break,
                    Some(SessionMsg::Event(event)) => self.process_event(event),
                    Some(SessionMsg::ConnectDone(result)) => self.connect_done(result),
                },
                () = Self::sleep_opt(self.connect_at), if self.connect_at.is_some() => {
                    self.connect_at = None;
                    self.start_connect();
                }
                () = Self::sleep_opt(self.walk.deadline()), if self.walk.is_armed() => {
                    self.walker_step();
                }
                () = Self::sleep_opt(self.dequeue_at), if self.dequeue_at.is_some() => {
                    self.dequeue_at = None;
                    self.process_queue();
                }
                () = self.core.dequeue_ready.notified() => self.process_queue(),
                () = self.core.write_ready.notified(), if self.sock.is_some() => self.write_obuf(),
                ready = Self::sock_ready(&self.sock, want_write), if self.sock.is_some() => {
                    match ready {
                        Ok(ready) => {
                            if ready.is_readable() && self.read_sock().is_break() {
                                continue;
                            }
                            if ready.is_writable() {
                                self.write_obuf();
                            }
                        }
                        Err(e) => {
                            FpmCounters::add(&self.core.counters.connection_errors, 1);
                            warn!("connection failure: {e}");
                            self.fail_connection();
                        }
                    }
                }
            }
        }
        self.teardown();
    }

    /// Handles external (CLI, dataplane or own) events.
    fn process_event(&mut self, event: FpmEvent) {
        match event {
            FpmEvent::SetAddress(address) => {
                info!("manual FPM configuration event");
                FpmCounters::add(&self.core.counters.user_configures, 1);
                self.address = Some(address);
                *self.core.address.lock().unwrap() = Some(address);
                self.set_disabled(false);
                self.reconnect();
            }
            FpmEvent::Disable => {
                info!("manual FPM disable event");
                FpmCounters::add(&self.core.counters.user_disables, 1);
                self.set_disabled(true);
                self.reconnect();
            }
            FpmEvent::ResetCounters => {
                info!("manual FPM counters reset event");
                self.core.counters.reset();
            }
            FpmEvent::ToggleNhg => {
                info!("toggle next hop groups support");
                self.core.use_nhg.fetch_xor(true, Ordering::Relaxed);
                self.reconnect();
            }
            FpmEvent::InternalReconnect => self.reconnect(),
            FpmEvent::WalkFinished(source) => debug!("{source} walk finished"),
        }
    }

    fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
        self.core.disabled.store(disabled, Ordering::Relaxed);
    }

    fn publish(&self, state: SockState) {
        self.core.state.store(state as u8, Ordering::Relaxed);
    }

    /// Post an internal reconnect event rather than tearing down inline, so
    /// read/write handlers never invalidate the state they run on.
    fn schedule_reconnect(&self) {
        let _ = self.core.tx.send(SessionMsg::Event(FpmEvent::InternalReconnect));
    }

    /// The connection is dead: stop using it right away and let the
    /// reconnect event do the full teardown. Dropping the socket here keeps
    /// a sticky EOF from re-firing the readiness arm (and inflating the
    /// counters) before the event is dispatched.
    fn fail_connection(&mut self) {
        self.sock = None;
        self.publish(SockState::Idle);
        self.schedule_reconnect();
    }

    /// Tear the connection down and, unless disabled, arm the reconnect
    /// timer.
    fn reconnect(&mut self) {
        self.walk.cancel();
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        self.sock = None;
        self.ibuf.clear();

        // The engine might be enqueueing while we drop the pending bytes.
        self.core.obuf.lock().unwrap().clear();
        self.core.counters.obuf_bytes.store(0, Ordering::Relaxed);

        self.connect_at = None;
        if self.disabled {
            self.publish(SockState::Disabled);
            return;
        }
        self.publish(SockState::Idle);
        self.connect_at = Some(Instant::now() + self.reconnect_delay);
    }

    fn start_connect(&mut self) {
        let Some(address) = self.address else {
            self.publish(SockState::Idle);
            return;
        };
        debug!("attempting to connect to {address}");
        self.publish(SockState::Connecting);
        let tx = self.core.tx.clone();
        self.connect_task = Some(tokio::spawn(async move {
            let result = TcpStream::connect(address).await;
            let _ = tx.send(SessionMsg::ConnectDone(result));
        }));
    }

    fn connect_done(&mut self, result: io::Result<TcpStream>) {
        self.connect_task = None;
        if self.disabled {
            return;
        }
        match result {
            Ok(sock) => {
                if let Err(e) = sock.set_nodelay(true) {
                    warn!("could not set TCP_NODELAY: {e}");
                }
                info!("connected to FPM peer {:?}", self.address);
                self.ibuf.clear();
                self.sock = Some(sock);
                self.publish(SockState::Connected);
                // Starting with LSPs, walk all FPM objects, marking them as
                // unsent and then replaying them.
                self.walk.start();
            }
            Err(e) => {
                FpmCounters::add(&self.core.counters.connection_errors, 1);
                warn!("fpm connection failed: {e}");
                self.publish(SockState::Idle);
                self.connect_at = Some(Instant::now() + self.reconnect_delay);
            }
        }
    }

    /// Drain the socket into `ibuf` and process complete frames.
    fn read_sock(&mut self) -> ControlFlow<()> {
        loop {
            let Some(sock) = &self.sock else {
                return ControlFlow::Continue(());
            };
            self.ibuf.reserve(NL_PKT_BUF_SIZE);
            match sock.try_read_buf(&mut self.ibuf) {
                Ok(0) => {
                    FpmCounters::add(&self.core.counters.connection_closes, 1);
                    debug!("connection closed");
                    self.fail_connection();
                    return ControlFlow::Break(());
                }
                Ok(n) => {
                    FpmCounters::add(&self.core.counters.bytes_read, n as u32);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    FpmCounters::add(&self.core.counters.connection_errors, 1);
                    warn!("connection failure: {e}");
                    self.fail_connection();
                    return ControlFlow::Break(());
                }
            }
        }
        self.drain_ibuf()
    }

    fn drain_ibuf(&mut self) -> ControlFlow<()> {
        loop {
            match FpmFrameCodec.decode(&mut self.ibuf) {
                Ok(None) => return ControlFlow::Continue(()),
                Ok(Some(payload)) => {
                    if self.handle_frame(&payload).is_break() {
                        return ControlFlow::Break(());
                    }
                }
                Err(e) => {
                    warn!("{e}");
                    self.fail_connection();
                    return ControlFlow::Break(());
                }
            }
        }
    }

    /// Inner netlink sanity checks and dispatch for one inbound frame.
    fn handle_frame(&mut self, payload: &[u8]) -> ControlFlow<()> {
        let frame_len = payload.len() + FPM_HEADER_SIZE;
        let Some(hdr) = NlMsgHdr::parse(payload) else {
            warn!("received runt netlink message of {} bytes", payload.len());
            return ControlFlow::Continue(());
        };
        if (hdr.len as usize) < NLMSG_HDRLEN {
            warn!(
                seq = hdr.seq,
                "invalid message length {} (< {NLMSG_HDRLEN})", hdr.len
            );
            return ControlFlow::Continue(());
        }
        if hdr.len as usize > frame_len {
            // The frame cannot be trusted beyond this message; stop the
            // frame loop once the reconnect is scheduled.
            warn!(
                "received an inner header length of {} that is greater than the fpm total length of {frame_len}",
                hdr.len
            );
            self.fail_connection();
            return ControlFlow::Break(());
        }
        if hdr.len as usize > payload.len() {
            warn!(
                seq = hdr.seq,
                "invalid message length {} (> {})",
                hdr.len,
                payload.len()
            );
            return ControlFlow::Continue(());
        }
        if hdr.flags & rtnl::NLM_F_REQUEST == 0 {
            debug!(seq = hdr.seq, "not a request, skipping");
            return ControlFlow::Continue(());
        }

        match hdr.msg_type {
            rtnl::RTM_NEWROUTE => {
                match notify::decode_route_notify(&payload[..hdr.len as usize]) {
                    Some(route_notify) => self
                        .core
                        .engine
                        .push_notification(DplaneCtx::route_notify(route_notify)),
                    None => debug!("ignoring malformed route notification"),
                }
            }
            other => {
                debug!("received message type {other} which is not currently handled");
            }
        }
        ControlFlow::Continue(())
    }

    /// Write pending output-buffer bytes to the socket.
    fn write_obuf(&mut self) {
        let Some(sock) = &self.sock else { return };
        let mut failed = false;
        {
            let mut obuf = self.core.obuf.lock().unwrap();
            loop {
                if obuf.pending() == 0 {
                    break;
                }
                match sock.try_write(obuf.chunk()) {
                    Ok(0) => {
                        FpmCounters::add(&self.core.counters.connection_closes, 1);
                        debug!("connection closed");
                        failed = true;
                        break;
                    }
                    Ok(n) => {
                        FpmCounters::add(&self.core.counters.bytes_sent, n as u32);
                        FpmCounters::sub(&self.core.counters.obuf_bytes, n as u32);
                        obuf.advance(n);
                    }
                    // Receiver is probably slow; give it some time.
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        FpmCounters::add(&self.core.counters.connection_errors, 1);
                        warn!("connection failure: {e}");
                        failed = true;
                        break;
                    }
                }
            }
        }
        if failed {
            self.fail_connection();
        }
    }

    /// Pull contexts from the queue into the output buffer, stopping early
    /// when the buffer is low on space.
    fn process_queue(&mut self) {
        let core = Arc::clone(&self.core);
        let mut processed: u32 = 0;
        let mut no_bufs = false;
        loop {
            if core.obuf.lock().unwrap().writable() < NL_PKT_BUF_SIZE {
                no_bufs = true;
                break;
            }
            let Some(mut ctx) = core.ctxqueue.pop(&core.counters) else {
                break;
            };

            if self.sock.is_some() {
                if let (DplaneOp::AddrInstall | DplaneOp::AddrUninstall, CtxBody::Addr(ac)) =
                    (ctx.op, &ctx.body)
                {
                    // An address change on "lo" may have moved the SRv6
                    // encap source: resend the affected routes.
                    if ac.ifname == "lo" {
                        self.walk.schedule_srv6_reset();
                    }
                }
                let tables = core.engine.tables();
                // The writable check above guarantees space for one message.
                let _ = core.enqueue(&tables, &ctx);
            }

            processed += 1;
            ctx.status = CtxStatus::Success;
            core.engine.push_completed(ctx);
        }
        FpmCounters::add(&core.counters.dplane_contexts, processed);

        // Out of buffer space: try again once the writer has drained some.
        if no_bufs {
            self.dequeue_at = Some(Instant::now());
        }
    }

    fn teardown(&mut self) {
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        self.walk.cancel();
        self.sock = None;
        self.publish(SockState::Disabled);
        debug!("FPM session finished");
    }
}

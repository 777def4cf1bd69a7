// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared node engine.
//!
//! `Engine::start` binds the UDP socket and launches the cooperative
//! activities: a receiver pulling datagrams into the inbound queue, a
//! dispatcher applying protocol rules, a monitor driving heartbeats and
//! eviction, and the role-specific scheduling or execution activity.
//! All of them watch one cancellation token so `stop` returns within a
//! bounded time.

use crate::aggregator::AggregatorState;
use crate::config::NodeConfig;
use crate::error::EngineError;
use crate::scheduler::CoordinatorState;
use crate::wedge::WedgeSet;
use crate::worker::WorkerState;
use jg_core::{
    Clock, GridEvent, JobCounts, Membership, NodeId, NodeInfo, NodeRole, SystemClock,
};
use jg_wire::{Body, JobManage, Message, NodeDescriptor, QUIT_SENTINEL};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Role-specific state hanging off the shared engine.
pub(crate) enum RoleState {
    Aggregator(AggregatorState),
    Coordinator(CoordinatorState),
    Worker(WorkerState),
}

pub(crate) struct EngineInner<C: Clock> {
    pub(crate) config: NodeConfig,
    pub(crate) clock: C,
    pub(crate) socket: UdpSocket,
    pub(crate) local_addr: SocketAddr,
    pub(crate) self_id: NodeId,
    pub(crate) membership: Mutex<Membership>,
    pub(crate) inbound_tx: mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>,
    pub(crate) events: broadcast::Sender<GridEvent>,
    pub(crate) cancel: CancellationToken,
    /// StopWork sets this; only the execution activity honors it.
    pub(crate) paused: AtomicBool,
    /// Worker mutual-exclusion marker, held for one accepted job.
    pub(crate) busy: AtomicBool,
    /// Task name of the last job this node completed.
    pub(crate) last_task: Mutex<Option<String>>,
    pub(crate) completed_jobs: std::sync::atomic::AtomicU32,
    /// command path → times run; drives wedge cleanup at shutdown.
    pub(crate) command_ran: Mutex<std::collections::HashMap<String, u32>>,
    pub(crate) wedges: WedgeSet,
    pub(crate) role: RoleState,
}

/// A running grid node.
pub struct Engine<C: Clock = SystemClock> {
    inner: Arc<EngineInner<C>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    exec_task: Mutex<Option<JoinHandle<()>>>,
}

impl Engine<SystemClock> {
    /// Start a node with the default clock and wedge set.
    pub async fn start(config: NodeConfig) -> Result<Self, EngineError> {
        let wedges = WedgeSet::with_defaults(&config.scratch_dir);
        Self::start_with(config, SystemClock, wedges).await
    }
}

impl<C: Clock> Engine<C> {
    /// Start a node with an explicit clock and wedge set.
    pub async fn start_with(
        config: NodeConfig,
        clock: C,
        wedges: WedgeSet,
    ) -> Result<Self, EngineError> {
        let socket = UdpSocket::bind(config.listen).await?;
        let local_addr = socket.local_addr()?;
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(1024);

        let role = match config.role {
            NodeRole::Aggregator => RoleState::Aggregator(AggregatorState::new(events.subscribe())),
            NodeRole::Coordinator => RoleState::Coordinator(CoordinatorState::new()),
            NodeRole::Worker => RoleState::Worker(WorkerState::new()),
        };

        let inner = Arc::new(EngineInner {
            self_id: NodeId::new(),
            clock,
            socket,
            local_addr,
            membership: Mutex::new(Membership::new()),
            inbound_tx,
            events,
            cancel: CancellationToken::new(),
            paused: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            last_task: Mutex::new(None),
            completed_jobs: std::sync::atomic::AtomicU32::new(0),
            command_ran: Mutex::new(std::collections::HashMap::new()),
            wedges,
            role,
            config,
        });

        info!(
            name = %inner.config.name,
            role = %inner.config.role,
            addr = %local_addr,
            id = %inner.self_id,
            "node starting"
        );

        // Node-start-time wedge warm-up
        let self_info = inner.self_info();
        for wedge in inner.wedges.iter() {
            if let Err(e) = wedge.execute(&self_info).await {
                warn!(wedge = wedge.name(), error = %e, "wedge warm-up failed");
            }
        }

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(receiver_loop(Arc::clone(&inner))));
        tasks.push(tokio::spawn(dispatcher_loop(Arc::clone(&inner), inbound_rx)));
        tasks.push(tokio::spawn(crate::monitor::monitor_loop(Arc::clone(&inner))));

        let mut exec_task = None;
        match inner.config.role {
            NodeRole::Coordinator => {
                tasks.push(tokio::spawn(crate::scheduler::scheduler_loop(Arc::clone(&inner))));
            }
            NodeRole::Worker => {
                exec_task = Some(tokio::spawn(crate::worker::executor_loop(Arc::clone(&inner))));
            }
            NodeRole::Aggregator => {}
        }

        // Register with the aggregator right away rather than waiting for
        // the first heartbeat tick.
        if let Some(aggregator) = inner.config.aggregator {
            inner.send_registry(&aggregator.to_string()).await;
        }

        Ok(Self { inner, tasks: Mutex::new(tasks), exec_task: Mutex::new(exec_task) })
    }

    /// Address the socket actually bound (port 0 resolves here).
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn node_id(&self) -> &NodeId {
        &self.inner.self_id
    }

    /// Subscribe to the node's internal event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<GridEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the membership table.
    pub fn members(&self) -> Vec<NodeInfo> {
        self.inner.membership.lock().iter().cloned().collect()
    }

    /// Local job counts (meaningful on a coordinator).
    pub fn job_counts(&self, task_name: Option<&str>) -> JobCounts {
        match &self.inner.role {
            RoleState::Coordinator(state) => state.job_counts(task_name),
            _ => JobCounts::default(),
        }
    }

    pub async fn send_to(&self, target: &str, msg: &Message) {
        self.inner.send_to(target, msg).await;
    }

    pub async fn send_to_all(&self, msg: &Message, role: Option<NodeRole>) {
        self.inner.send_to_all(msg, role).await;
    }

    /// Ask a remote node for its job counts; waits out the reply window.
    pub async fn query(&self, target: &str, task_name: Option<&str>) -> Option<JobCounts> {
        let mut events = self.inner.events.subscribe();
        let msg = Message::new(Body::JobManage(JobManage::Query {
            task_name: task_name.map(str::to_string),
        }))
        .with_sender(self.inner.self_descriptor());
        self.inner.send_to(target, &msg).await;

        let window = self.inner.config.timing.query_window;
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let recv = tokio::time::timeout_at(deadline, events.recv()).await;
            match recv {
                Ok(Ok(GridEvent::QueryReply { counts })) => return Some(counts),
                Ok(Ok(_)) => continue,
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                _ => return None,
            }
        }
    }

    /// Stop all activities, run wedge cleanup, and release the socket.
    pub async fn stop(self) -> Result<(), EngineError> {
        info!(name = %self.inner.config.name, "node stopping");
        self.inner.cancel.cancel();

        // Unblock the receiver with the in-process sentinel.
        let _ = self
            .inner
            .socket
            .send_to(&jg_wire::utf16le_encode(QUIT_SENTINEL), self.inner.local_addr)
            .await;

        let mut result = Ok(());
        let exec = self.exec_task.lock().take();
        if let Some(exec) = exec {
            let join = tokio::time::timeout(self.inner.config.timing.stop_join, exec).await;
            if join.is_err() {
                warn!("execution activity did not stop in time, proceeding without it");
                result = Err(EngineError::StopTimeout(self.inner.config.timing.stop_join));
            }
        }
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = tokio::time::timeout(std::time::Duration::from_secs(1), task).await;
        }

        // Wedge cleanup, once per distinct command that ever ran.
        let commands: Vec<String> = self.inner.command_ran.lock().keys().cloned().collect();
        for command in &commands {
            for wedge in self.inner.wedges.iter() {
                if let Err(e) = wedge.cleanup(command).await {
                    warn!(wedge = wedge.name(), command = %command, error = %e, "wedge cleanup failed");
                }
            }
        }

        result
    }
}

impl<C: Clock> EngineInner<C> {
    /// This node as a membership entry.
    pub(crate) fn self_info(&self) -> NodeInfo {
        let mut info = NodeInfo::new(
            self.self_id.clone(),
            self.config.name.clone(),
            self.local_addr.ip().to_string(),
            self.local_addr.port(),
            self.config.role,
            &self.clock,
        )
        .with_processor_count(self.config.processor_count);
        info.busy = self.busy.load(Ordering::Acquire);
        info.last_task = self.last_task.lock().clone();
        info.completed_jobs = self.completed_jobs.load(Ordering::Relaxed);
        info
    }

    /// This node as the `<Node/>` sender element.
    pub(crate) fn self_descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::from_info(&self.self_info())
    }

    /// Encode and emit one datagram; one retry after a transient failure.
    pub(crate) async fn send_to(&self, target: &str, msg: &Message) {
        let bytes = match jg_wire::encode(msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(kind = msg.kind(), error = %e, "message encode failed");
                return;
            }
        };
        match self.socket.send_to(&bytes, target).await {
            Ok(_) => {}
            Err(first) => {
                tokio::time::sleep(self.config.timing.send_retry_delay).await;
                if let Err(second) = self.socket.send_to(&bytes, target).await {
                    warn!(
                        to = target,
                        kind = msg.kind(),
                        first = %first,
                        second = %second,
                        "send failed after retry, dropping"
                    );
                    return;
                }
            }
        }
        debug!(to = target, kind = msg.kind(), "sent");
        let _ = self
            .events
            .send(GridEvent::MessageSent { to: target.to_string(), kind: msg.kind() });
    }

    /// Send to every known peer, optionally restricted to one role.
    pub(crate) async fn send_to_all(&self, msg: &Message, role: Option<NodeRole>) {
        let self_endpoint = self.self_endpoint();
        let targets: Vec<String> = {
            let membership = self.membership.lock();
            membership
                .iter()
                .filter(|n| role.map_or(true, |r| n.role == r))
                .map(|n| n.endpoint())
                .filter(|ep| *ep != self_endpoint)
                .collect()
        };
        for target in targets {
            self.send_to(&target, msg).await;
        }
    }

    pub(crate) fn self_endpoint(&self) -> String {
        format!("{}:{}", self.local_addr.ip(), self.local_addr.port())
    }

    pub(crate) async fn send_registry(&self, target: &str) {
        let msg = Message::new(Body::Control {
            command: jg_wire::ControlCommand::Registry,
            guid: None,
            result: None,
        })
        .with_sender(self.self_descriptor());
        self.send_to(target, &msg).await;
    }
}

/// Receiver activity: socket → inbound queue.
async fn receiver_loop<C: Clock>(inner: Arc<EngineInner<C>>) {
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            result = inner.socket.recv_from(&mut buf) => match result {
                Ok((len, src)) => {
                    let payload = buf[..len].to_vec();
                    if is_quit_sentinel(&payload) {
                        if inner.cancel.is_cancelled() {
                            break;
                        }
                        // A peer's sentinel is never a protocol message.
                        debug!(from = %src, "ignoring quit sentinel");
                        continue;
                    }
                    let _ = inner.inbound_tx.send((payload, src));
                }
                Err(e) => {
                    if inner.cancel.is_cancelled() {
                        break;
                    }
                    warn!(error = %e, "udp receive error");
                }
            }
        }
    }
    debug!("receiver stopped");
}

fn is_quit_sentinel(payload: &[u8]) -> bool {
    payload.len() == QUIT_SENTINEL.len() * 2
        && jg_wire::utf16le_decode(payload).is_ok_and(|s| s == QUIT_SENTINEL)
}

/// Dispatcher activity: inbound queue → protocol rules.
async fn dispatcher_loop<C: Clock>(
    inner: Arc<EngineInner<C>>,
    mut inbound_rx: mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>,
) {
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            next = inbound_rx.recv() => match next {
                Some((payload, src)) => inner.handle_datagram(payload, src).await,
                None => break,
            }
        }
    }
    debug!("dispatcher stopped");
}

//! The wallet manager and peer manager handlers.
//!
//! Both dispatch under one shared lock so neither observes the other's state
//! mid-update. The peer manager forwards new blocks to the wallet manager as
//! out-of-band rescans; the wallet manager runs a periodic tick.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use walletcore_event::{
    DispatchLock, Event, EventHandler, EventResult, EventType, EventsConfig, TimeoutEvent,
};

pub(crate) const WALLET_MANAGER: &str = "wallet manager";
pub(crate) const PEER_MANAGER: &str = "peer manager";

#[derive(Debug)]
pub(crate) enum WalletEvent {
    Deposit(u64),
    Withdrawal(u64),
    Rescan { from_height: u64 },
}

impl Event for WalletEvent {
    fn type_name(&self) -> &'static str {
        match self {
            WalletEvent::Deposit(_) => "Wallet Deposit",
            WalletEvent::Withdrawal(_) => "Wallet Withdrawal",
            WalletEvent::Rescan { .. } => "Wallet Rescan",
        }
    }
}

#[derive(Debug)]
pub(crate) enum PeerEvent {
    Connected(u32),
    Disconnected(u32),
    NewBlock(u64),
}

impl Event for PeerEvent {
    fn type_name(&self) -> &'static str {
        match self {
            PeerEvent::Connected(_) => "Peer Connected",
            PeerEvent::Disconnected(_) => "Peer Disconnected",
            PeerEvent::NewBlock(_) => "Peer New Block",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct WalletState {
    pub balance: AtomicU64,
    pub rejected: AtomicU64,
    pub rescans: AtomicU64,
    pub ticks: AtomicU64,
}

#[derive(Debug, Default)]
pub(crate) struct PeerState {
    pub connected: Mutex<BTreeSet<u32>>,
    pub height: AtomicU64,
}

pub(crate) struct Subsystems {
    pub wallet: EventHandler<WalletEvent>,
    pub peers: EventHandler<PeerEvent>,
    pub wallet_state: Arc<WalletState>,
    pub peer_state: Arc<PeerState>,
}

impl Subsystems {
    /// Create both handlers, stopped.
    pub fn new(config: &EventsConfig, tick: Duration) -> Self {
        let lock: DispatchLock = Arc::new(Mutex::new(()));
        let wallet_state = Arc::new(WalletState::default());
        let peer_state = Arc::new(PeerState::default());

        let wallet = EventHandler::with_config(
            config.handler_or_default(WALLET_MANAGER),
            wallet_types(&wallet_state),
            Some(lock.clone()),
        );
        wallet.set_timeout_dispatcher(tick, wallet_tick, wallet_state.clone());

        let peers = EventHandler::with_config(
            config.handler_or_default(PEER_MANAGER),
            peer_types(&peer_state, wallet.clone()),
            Some(lock),
        );

        Self {
            wallet,
            peers,
            wallet_state,
            peer_state,
        }
    }

    pub fn start(&self) -> EventResult<()> {
        self.wallet.start()?;
        self.peers.start()
    }

    /// Stop the producer side first so no forwarded rescan outlives it.
    pub fn stop(&self) {
        self.peers.stop();
        self.wallet.stop();
    }

    pub fn destroy(self) {
        self.peers.destroy();
        self.wallet.destroy();
    }
}

fn wallet_types(state: &Arc<WalletState>) -> Vec<EventType<WalletEvent>> {
    let deposits = state.clone();
    let withdrawals = state.clone();
    let rescans = state.clone();
    vec![
        EventType::new("Wallet Deposit", move |_, event| {
            if let WalletEvent::Deposit(amount) = event {
                deposits.balance.fetch_add(amount, Ordering::Relaxed);
            }
        }),
        EventType::new("Wallet Withdrawal", move |_, event| {
            if let WalletEvent::Withdrawal(amount) = event {
                let taken = withdrawals
                    .balance
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |b| b.checked_sub(amount));
                if taken.is_err() {
                    withdrawals.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!("Withdrawal of {} exceeds balance", amount);
                }
            }
        }),
        EventType::new("Wallet Rescan", move |_, event| {
            if let WalletEvent::Rescan { from_height } = event {
                rescans.rescans.fetch_add(1, Ordering::Relaxed);
                debug!("Wallet rescan from height {}", from_height);
            }
        }),
    ]
}

fn wallet_tick(handler: &EventHandler<WalletEvent>, event: &TimeoutEvent, state: &Arc<WalletState>) {
    let ticks = state.ticks.fetch_add(1, Ordering::Relaxed) + 1;
    trace!(
        "{} tick {} ({} due {})",
        handler.name(),
        ticks,
        event.alarm,
        event.expiration
    );
}

fn peer_types(
    state: &Arc<PeerState>,
    wallet: EventHandler<WalletEvent>,
) -> Vec<EventType<PeerEvent>> {
    let connects = state.clone();
    let disconnects = state.clone();
    let blocks = state.clone();
    vec![
        EventType::new("Peer Connected", move |_, event| {
            if let PeerEvent::Connected(peer) = event {
                connects.connected.lock().insert(peer);
            }
        }),
        EventType::new("Peer Disconnected", move |_, event| {
            if let PeerEvent::Disconnected(peer) = event {
                disconnects.connected.lock().remove(&peer);
            }
        }),
        EventType::new("Peer New Block", move |_, event| {
            if let PeerEvent::NewBlock(height) = event {
                blocks.height.fetch_max(height, Ordering::Relaxed);
                // Rescans jump ahead of queued wallet work.
                if let Err(e) = wallet.signal_event_oob(WalletEvent::Rescan { from_height: height }) {
                    warn!("Rescan not forwarded: {}", e);
                }
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    fn wait_for(what: &str, condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_wallet_and_peers() {
        let subsystems = Subsystems::new(&EventsConfig::default(), Duration::from_millis(10));
        subsystems.start().unwrap();

        subsystems.wallet.signal_event(WalletEvent::Deposit(50)).unwrap();
        subsystems.wallet.signal_event(WalletEvent::Withdrawal(80)).unwrap();
        subsystems.wallet.signal_event(WalletEvent::Withdrawal(20)).unwrap();
        subsystems.peers.signal_event(PeerEvent::Connected(1)).unwrap();
        subsystems.peers.signal_event(PeerEvent::Connected(2)).unwrap();
        subsystems.peers.signal_event(PeerEvent::Disconnected(1)).unwrap();
        subsystems.peers.signal_event(PeerEvent::NewBlock(900)).unwrap();

        let wallet = subsystems.wallet_state.clone();
        let peers = subsystems.peer_state.clone();
        wait_for("rescan", || wallet.rescans.load(Ordering::Relaxed) == 1);
        wait_for("withdrawals", || {
            subsystems.wallet.metrics().snapshot().events_dispatched == 4
        });
        wait_for("ticks", || wallet.ticks.load(Ordering::Relaxed) >= 1);

        assert_eq!(wallet.balance.load(Ordering::Relaxed), 30);
        assert_eq!(wallet.rejected.load(Ordering::Relaxed), 1);
        assert_eq!(peers.height.load(Ordering::Relaxed), 900);
        assert_eq!(*peers.connected.lock(), BTreeSet::from([2]));

        subsystems.destroy();
    }
}

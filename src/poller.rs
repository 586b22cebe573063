//! Fixed-cadence telemetry polling.
//!
//! A tick is fetched and completed before the next one may start, so ticks
//! never overlap. Every request carries a [`PollTicket`]; only the response of
//! the most recently issued ticket is applied, which also covers out-of-band
//! refreshes raced against a scheduled tick.

use crate::{
    error::ClientResult,
    http_client::Transport,
    settings_client::SettingsClient,
    telemetry::{DashboardTelemetry, SystemStatus, Telemetry},
};
use log::{debug, error, info};
use std::{fmt::Debug, time::Duration};
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};

pub const STATUS_ENDPOINT: &str = "/api/sysstatus";

/// Where derived presentation state is rendered
pub trait DisplaySink<V> {
    fn display(&mut self, view: &V);
}

/// Sink writing each rendered view to the log
#[derive(Clone, Debug)]
pub struct LogSink {
    name: &'static str,
}

impl LogSink {
    pub fn new(name: &'static str) -> Self {
        LogSink { name }
    }
}

impl<V: Debug> DisplaySink<V> for LogSink {
    fn display(&mut self, view: &V) {
        info!("{}: {view:?}", self.name);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PollTicket(u64);

/// Monotonic ticket counter
#[derive(Debug, Default)]
pub struct PollSequence {
    latest: u64,
}

impl PollSequence {
    pub fn issue(&mut self) -> PollTicket {
        self.latest += 1;
        PollTicket(self.latest)
    }

    pub fn is_latest(&self, ticket: PollTicket) -> bool {
        ticket.0 == self.latest
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollPhase {
    /// No tick has succeeded yet
    Placeholder,
    Live,
}

pub struct Poller<T, D: Telemetry> {
    client: SettingsClient<T>,
    path: String,
    interval: Duration,
    sequence: PollSequence,
    snapshot: Option<D>,
    view: Option<D::View>,
}

pub type DashboardPoller<T> = Poller<T, DashboardTelemetry>;
pub type StatusPoller<T> = Poller<T, SystemStatus>;

impl<T: Transport> StatusPoller<T> {
    pub fn status(client: SettingsClient<T>, interval: Duration) -> Self {
        Poller::new(client, STATUS_ENDPOINT, interval)
    }
}

impl<T: Transport, D: Telemetry> Poller<T, D> {
    pub fn new(client: SettingsClient<T>, path: &str, interval: Duration) -> Self {
        Poller {
            client,
            path: path.to_string(),
            interval,
            sequence: PollSequence::default(),
            snapshot: None,
            view: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn phase(&self) -> PollPhase {
        if self.view.is_some() {
            PollPhase::Live
        } else {
            PollPhase::Placeholder
        }
    }

    pub fn snapshot(&self) -> Option<&D> {
        self.snapshot.as_ref()
    }

    pub fn view(&self) -> Option<&D::View> {
        self.view.as_ref()
    }

    /// Issue the ticket for a new request, superseding all earlier ones
    pub fn begin(&mut self) -> PollTicket {
        self.sequence.issue()
    }

    /// Apply the result of the request issued under `ticket`.
    ///
    /// Returns the new view to render, or `None` when nothing changed: the
    /// ticket was superseded or the request failed. A failure keeps the
    /// previous snapshot.
    pub fn complete(&mut self, ticket: PollTicket, result: ClientResult<D>) -> Option<&D::View> {
        if !self.sequence.is_latest(ticket) {
            debug!("discarding stale response {ticket:?} for {}", self.path);
            return None;
        }

        match result {
            Ok(snapshot) => {
                if self.view.is_none() {
                    info!("{} is live", self.path);
                }
                self.view = Some(snapshot.derive_view());
                self.snapshot = Some(snapshot);
                self.view.as_ref()
            }
            Err(e) => {
                error!("poll of {} failed: {e}", self.path);
                None
            }
        }
    }

    /// One complete fetch/derive cycle
    pub async fn tick(&mut self) -> Option<&D::View> {
        let ticket = self.begin();
        let result = self.client.load_json::<D>(&self.path).await;
        self.complete(ticket, result)
    }

    /// Poll until the future is dropped; the first tick fires immediately
    pub async fn run<S: DisplaySink<D::View>>(&mut self, sink: &mut S) {
        // the sender is kept so the refresh branch never closes
        let (_refresh_tx, mut refresh_rx) = mpsc::channel(1);
        self.run_with_refresh(sink, &mut refresh_rx).await
    }

    /// Like [`Poller::run`], additionally ticking whenever `refresh` yields
    pub async fn run_with_refresh<S: DisplaySink<D::View>>(
        &mut self,
        sink: &mut S,
        refresh: &mut mpsc::Receiver<()>,
    ) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut refresh_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                received = refresh.recv(), if refresh_open => {
                    if received.is_none() {
                        refresh_open = false;
                        continue;
                    }
                    debug!("manual refresh of {}", self.path);
                }
            }

            if let Some(view) = self.tick().await {
                sink.display(view);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ClientError,
        http_client::MockTransport,
        telemetry::{DashboardView, OperatingMode, ThreadBadge},
    };
    use serde_json::json;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    struct RecordingSink<V> {
        views: Vec<V>,
    }

    impl<V> Default for RecordingSink<V> {
        fn default() -> Self {
            RecordingSink { views: Vec::new() }
        }
    }

    impl<V: Clone> DisplaySink<V> for RecordingSink<V> {
        fn display(&mut self, view: &V) {
            self.views.push(view.clone());
        }
    }

    fn dashboard_body(setpoint: &str) -> String {
        json!({
            "battery": {"charge": "0.5"},
            "inverter": {"setpoint": setpoint},
            "grid": {"voltage": "230", "freqency": "50"},
            "relays": {"relay1": false, "relay2": false, "relay3": false, "relay4": false},
            "tcontrol": {"mode": "Off"}
        })
        .to_string()
    }

    fn dashboard(setpoint: &str) -> DashboardTelemetry {
        serde_json::from_str(&dashboard_body(setpoint)).unwrap()
    }

    fn poller(transport: MockTransport) -> DashboardPoller<MockTransport> {
        Poller::new(
            SettingsClient::new(transport),
            "/api/status",
            Duration::from_millis(2500),
        )
    }

    mod sequence {
        use super::*;

        #[test]
        fn only_latest_ticket_is_current() {
            let mut sequence = PollSequence::default();
            let first = sequence.issue();
            let second = sequence.issue();

            assert!(first < second);
            assert!(!sequence.is_latest(first));
            assert!(sequence.is_latest(second));
        }
    }

    mod complete {
        use super::*;

        #[test]
        fn stale_response_is_discarded() {
            let mut poller = poller(MockTransport::new());

            let stale = poller.begin();
            let latest = poller.begin();

            assert!(poller.complete(latest, Ok(dashboard("-150"))).is_some());
            assert!(poller.complete(stale, Ok(dashboard("300"))).is_none());
            assert_eq!(poller.view().unwrap().mode, OperatingMode::Charging);
        }

        #[test]
        fn failure_keeps_previous_snapshot() {
            let mut poller = poller(MockTransport::new());

            let ticket = poller.begin();
            poller.complete(ticket, Ok(dashboard("-150")));

            let ticket = poller.begin();
            let failed = poller.complete(
                ticket,
                Err(ClientError::transport("GET /api/status", "connection refused")),
            );

            assert!(failed.is_none());
            assert_eq!(poller.phase(), PollPhase::Live);
            assert_eq!(poller.view().unwrap().mode, OperatingMode::Charging);
        }

        #[test]
        fn placeholder_until_first_success() {
            let mut poller = poller(MockTransport::new());
            assert_eq!(poller.phase(), PollPhase::Placeholder);

            let ticket = poller.begin();
            poller.complete(ticket, Err(ClientError::transport("GET /api/status", "timeout")));
            assert_eq!(poller.phase(), PollPhase::Placeholder);

            let ticket = poller.begin();
            poller.complete(ticket, Ok(dashboard("0")));
            assert_eq!(poller.phase(), PollPhase::Live);
        }
    }

    mod tick {
        use super::*;

        #[tokio::test]
        async fn mode_follows_each_snapshot() {
            let mut transport = MockTransport::new();
            let mut sequence = mockall::Sequence::new();
            transport
                .expect_get()
                .withf(|path| path == "/api/status")
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_| Box::pin(async { Ok(dashboard_body("-150")) }));
            transport
                .expect_get()
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_| Box::pin(async { Ok(dashboard_body("0")) }));
            let mut poller = poller(transport);

            assert_eq!(poller.tick().await.unwrap().mode, OperatingMode::Charging);
            assert_eq!(poller.tick().await.unwrap().mode, OperatingMode::Idle);
        }

        #[tokio::test]
        async fn status_poller_uses_sysstatus() {
            let mut transport = MockTransport::new();
            transport
                .expect_get()
                .withf(|path| path == "/api/sysstatus")
                .times(1)
                .returning(|_| {
                    Box::pin(async {
                        Ok(json!({
                            "threads": {
                                "gateway": {"tid": 1, "running": true},
                                "mailbox": {"tid": 2, "running": false},
                                "tcontrol": {"tid": 3, "running": true}
                            },
                            "system": {
                                "gateway": {"connection": "10.0.0.5:502", "inverterConnected": false, "inverterUpdated": false},
                                "mailbox": {"connection": "localhost:1883", "connected": false},
                                "tcontrol": {"device": "/dev/ttyS0", "deviceAvailable": true, "lastCmdOk": true}
                            }
                        })
                        .to_string())
                    })
                });
            let mut poller =
                StatusPoller::status(SettingsClient::new(transport), Duration::from_secs(5));

            let view = poller.tick().await.unwrap();

            assert_eq!(view.mailbox.badge, ThreadBadge::Terminated);
            assert_eq!(view.tcontrol.flag("lastCmdOk"), Some(true));
        }
    }

    mod run {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn first_tick_is_immediate_then_fixed_cadence() {
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&calls);
            let mut transport = MockTransport::new();
            transport.expect_get().returning(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(dashboard_body("-150")) })
            });
            let mut poller = poller(transport);
            let mut sink = RecordingSink::<DashboardView>::default();

            // ticks at 0, 2500 and 5000 ms
            let _ = time::timeout(Duration::from_millis(5100), poller.run(&mut sink)).await;

            assert_eq!(calls.load(Ordering::SeqCst), 3);
            assert_eq!(sink.views.len(), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn failed_ticks_render_nothing() {
            let mut transport = MockTransport::new();
            transport.expect_get().returning(|_| {
                Box::pin(async {
                    Err(ClientError::Status {
                        action: "GET /api/status".to_string(),
                        status: 503,
                    })
                })
            });
            let mut poller = poller(transport);
            let mut sink = RecordingSink::<DashboardView>::default();

            let _ = time::timeout(Duration::from_millis(5100), poller.run(&mut sink)).await;

            assert!(sink.views.is_empty());
            assert_eq!(poller.phase(), PollPhase::Placeholder);
        }

        #[tokio::test(start_paused = true)]
        async fn refresh_runs_an_extra_tick() {
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&calls);
            let mut transport = MockTransport::new();
            transport.expect_get().returning(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(dashboard_body("0")) })
            });
            let mut poller = poller(transport);
            let mut sink = RecordingSink::<DashboardView>::default();
            let (refresh_tx, mut refresh_rx) = mpsc::channel(1);
            refresh_tx.send(()).await.unwrap();
            drop(refresh_tx);

            let _ = time::timeout(
                Duration::from_millis(1000),
                poller.run_with_refresh(&mut sink, &mut refresh_rx),
            )
            .await;

            // immediate tick plus the refresh
            assert_eq!(calls.load(Ordering::SeqCst), 2);
            assert_eq!(sink.views.len(), 2);
        }
    }
}

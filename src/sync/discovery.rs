//! Bounded-concurrency parameter discovery

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;

use super::{PeerInfo, PeerObfuscation, PeerParamsSource};
use crate::error::{Error, Result};
use crate::obfuscation::ObfuscationParams;

/// Requests in flight at once
pub const MAX_CONCURRENT: usize = 10;

/// Time allowed for a single peer to answer
pub const PER_PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Discovery tuning
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryOptions {
    pub max_concurrent: usize,
    pub per_peer_timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_concurrent: MAX_CONCURRENT,
            per_peer_timeout: PER_PEER_TIMEOUT,
        }
    }
}

/// What happened for one peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerOutcome {
    /// Peer runs non-standard parameters
    Custom {
        params: ObfuscationParams,
        elapsed: Duration,
    },
    /// Peer runs standard WireGuard
    Standard,
    /// Request failed, timed out or was cancelled
    Failed(String),
}

/// Aggregate counts for one discovery pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscoveryStats {
    pub total: usize,
    pub with_config: usize,
    pub standard: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl fmt::Display for DiscoveryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total | {} with config | {} standard | {} failed | duration {:.2}s",
            self.total,
            self.with_config,
            self.standard,
            self.failed,
            self.duration.as_secs_f64()
        )
    }
}

/// Result of a discovery pass, everything in input order
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Peers with non-standard parameters
    pub configs: Vec<PeerObfuscation>,
    pub stats: DiscoveryStats,
    /// One entry per queried peer
    pub outcomes: Vec<(PeerInfo, PeerOutcome)>,
}

impl DiscoveryReport {
    /// Per-peer lines for operator output
    pub fn outcome_lines(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|(peer, outcome)| match outcome {
                PeerOutcome::Custom { elapsed, .. } => format!(
                    "[OK] {} ({}): config found ({}ms)",
                    peer.label(),
                    peer.address,
                    elapsed.as_millis()
                ),
                PeerOutcome::Standard => {
                    format!("[--] {} ({}): standard WireGuard", peer.label(), peer.address)
                }
                PeerOutcome::Failed(reason) => {
                    format!("[ERR] {} ({}): {}", peer.label(), peer.address, reason)
                }
            })
            .collect()
    }
}

/// Query every peer with the default limits
pub async fn discover(
    peers: &[PeerInfo],
    source: Arc<dyn PeerParamsSource>,
    cancel: &CancellationToken,
) -> DiscoveryReport {
    discover_with(peers, source, DiscoveryOptions::default(), cancel).await
}

/// Query every peer until `interrupt` resolves.
///
/// Pending peers are cancelled when `interrupt` fires first. The interrupt
/// future is dropped as soon as the pass returns, so it only covers
/// discovery.
pub async fn discover_until<F>(
    peers: &[PeerInfo],
    source: Arc<dyn PeerParamsSource>,
    options: DiscoveryOptions,
    interrupt: F,
) -> DiscoveryReport
where
    F: Future<Output = ()>,
{
    let cancel = CancellationToken::new();
    let pass = discover_with(peers, source, options, &cancel);
    tokio::pin!(pass);

    tokio::select! {
        report = &mut pass => report,
        _ = interrupt => {
            tracing::info!("Discovery interrupted, cancelling pending peers");
            cancel.cancel();
            pass.await
        }
    }
}

/// Query every peer.
///
/// A failed, slow or cancelled peer only affects its own entry; the pass as
/// a whole always completes.
pub async fn discover_with(
    peers: &[PeerInfo],
    source: Arc<dyn PeerParamsSource>,
    options: DiscoveryOptions,
    cancel: &CancellationToken,
) -> DiscoveryReport {
    let start = Instant::now();
    let gate = Arc::new(Semaphore::new(options.max_concurrent.max(1)));
    let (tx, mut rx) = mpsc::channel(peers.len().max(1));

    let mut handles = Vec::with_capacity(peers.len());
    for (index, peer) in peers.iter().enumerate() {
        let peer = peer.clone();
        let source = Arc::clone(&source);
        let gate = Arc::clone(&gate);
        let cancel = cancel.clone();
        let tx = tx.clone();
        let per_peer_timeout = options.per_peer_timeout;

        handles.push(tokio::spawn(async move {
            let began = Instant::now();
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(Error::Cancelled),
                result = request_one(&peer, source.as_ref(), &gate, per_peer_timeout) => result,
            };
            let _ = tx.send((index, result, began.elapsed())).await;
        }));
    }
    drop(tx);

    let mut slots: Vec<Option<(Result<ObfuscationParams>, Duration)>> =
        (0..peers.len()).map(|_| None).collect();
    while let Some((index, result, elapsed)) = rx.recv().await {
        slots[index] = Some((result, elapsed));
    }
    for joined in futures::future::join_all(handles).await {
        if let Err(e) = joined {
            tracing::warn!("Discovery task failed: {}", e);
        }
    }

    let mut report = DiscoveryReport::default();
    report.stats.total = peers.len();
    for (peer, slot) in peers.iter().zip(slots) {
        let outcome = match slot {
            Some((Ok(params), elapsed)) if !params.is_standard() => {
                report.stats.with_config += 1;
                report.configs.push(PeerObfuscation {
                    peer: peer.clone(),
                    params: params.clone(),
                });
                PeerOutcome::Custom { params, elapsed }
            }
            Some((Ok(_), _)) => {
                report.stats.standard += 1;
                PeerOutcome::Standard
            }
            Some((Err(e), _)) => {
                report.stats.failed += 1;
                tracing::debug!("Peer {} ({}) failed: {}", peer.label(), peer.address, e);
                PeerOutcome::Failed(e.to_string())
            }
            None => {
                report.stats.failed += 1;
                PeerOutcome::Failed("request task aborted".to_string())
            }
        };
        report.outcomes.push((peer.clone(), outcome));
    }
    report.stats.duration = start.elapsed();

    tracing::info!("Discovery finished: {}", report.stats);
    report
}

async fn request_one(
    peer: &PeerInfo,
    source: &dyn PeerParamsSource,
    gate: &Semaphore,
    per_peer_timeout: Duration,
) -> Result<ObfuscationParams> {
    let _permit = gate.acquire().await.map_err(|_| Error::Cancelled)?;
    match timeout(per_peer_timeout, source.request_params(peer)).await {
        Ok(result) => result,
        Err(_) => Err(Error::PeerTimeout(peer.label())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::NodePublic;
    use async_trait::async_trait;
    use rand::Rng;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn peer(b: u8, name: &str) -> PeerInfo {
        PeerInfo {
            public_key: NodePublic::from_bytes([b; 32]),
            name: name.to_string(),
            address: format!("100.64.0.{}:7655", b),
        }
    }

    enum Reply {
        Params(ObfuscationParams),
        Hang,
        Fail,
    }

    /// In-memory source with a fixed delay per peer
    struct ScriptedSource {
        replies: HashMap<NodePublic, (Duration, Reply)>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(replies: Vec<(PeerInfo, Duration, Reply)>) -> Self {
            Self {
                replies: replies
                    .into_iter()
                    .map(|(p, delay, reply)| (p.public_key, (delay, reply)))
                    .collect(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PeerParamsSource for ScriptedSource {
        async fn request_params(&self, peer: &PeerInfo) -> Result<ObfuscationParams> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let (delay, reply) = &self.replies[&peer.public_key];
            let result = match reply {
                Reply::Params(p) => {
                    tokio::time::sleep(*delay).await;
                    Ok(p.clone())
                }
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(ObfuscationParams::default())
                }
                Reply::Fail => {
                    tokio::time::sleep(*delay).await;
                    Err(Error::PeerRequest {
                        peer: peer.label(),
                        reason: "connection reset".into(),
                    })
                }
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn custom(jc: u16) -> ObfuscationParams {
        ObfuscationParams { jc, jmin: 64, jmax: 96, ..Default::default() }
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_peer_scenario() {
        let (a, b, c) = (peer(1, "alpha"), peer(2, "bravo"), peer(3, "charlie"));
        let source = Arc::new(ScriptedSource::new(vec![
            (a.clone(), Duration::from_millis(20), Reply::Params(ObfuscationParams::default())),
            (b.clone(), Duration::ZERO, Reply::Hang),
            (c.clone(), Duration::from_millis(50), Reply::Params(custom(4))),
        ]));

        let report = discover(&[a, b, c.clone()], source, &CancellationToken::new()).await;

        assert_eq!(report.stats.total, 3);
        assert_eq!(report.stats.with_config, 1);
        assert_eq!(report.stats.standard, 1);
        assert_eq!(report.stats.failed, 1);
        assert!(report.stats.duration >= PER_PEER_TIMEOUT);
        assert_eq!(report.configs, vec![PeerObfuscation { peer: c, params: custom(4) }]);

        assert!(matches!(report.outcomes[0].1, PeerOutcome::Standard));
        assert!(matches!(report.outcomes[1].1, PeerOutcome::Failed(_)));
        assert!(matches!(report.outcomes[2].1, PeerOutcome::Custom { .. }));

        let lines = report.outcome_lines();
        assert!(lines[0].starts_with("[--] alpha"));
        assert!(lines[1].starts_with("[ERR] bravo"));
        assert!(lines[2].starts_with("[OK] charlie"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_is_input_order_under_random_latency() {
        let peers: Vec<PeerInfo> = (1..=40).map(|b| peer(b, &format!("node-{}", b))).collect();
        let expected: Vec<u8> = (1..=40).filter(|b| b % 3 != 0).collect();

        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            let replies = peers
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let delay = Duration::from_millis(rng.gen_range(0..3000));
                    let reply = if (i + 1) % 3 == 0 {
                        Reply::Params(ObfuscationParams::default())
                    } else {
                        Reply::Params(custom(i as u16 + 1))
                    };
                    (p.clone(), delay, reply)
                })
                .collect();
            let source = Arc::new(ScriptedSource::new(replies));

            let report = discover(&peers, source, &CancellationToken::new()).await;
            let order: Vec<u8> =
                report.configs.iter().map(|c| c.peer.public_key.as_bytes()[0]).collect();
            assert_eq!(order, expected);
            for entry in &report.configs {
                assert_eq!(entry.params.jc, entry.peer.public_key.as_bytes()[0] as u16);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let peers: Vec<PeerInfo> = (1..=25).map(|b| peer(b, "")).collect();
        let source = Arc::new(ScriptedSource::new(
            peers
                .iter()
                .map(|p| (p.clone(), Duration::from_millis(100), Reply::Params(custom(1))))
                .collect(),
        ));

        let report = discover(&peers, source.clone(), &CancellationToken::new()).await;
        assert_eq!(report.stats.with_config, 25);
        assert_eq!(source.peak.load(Ordering::SeqCst), MAX_CONCURRENT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_per_peer() {
        let (a, b) = (peer(1, "a"), peer(2, "b"));
        let source = Arc::new(ScriptedSource::new(vec![
            (a.clone(), Duration::from_millis(5), Reply::Fail),
            (b.clone(), Duration::from_millis(5), Reply::Params(custom(2))),
        ]));
        let report = discover(&[a, b], source, &CancellationToken::new()).await;
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.with_config, 1);
        match &report.outcomes[0].1 {
            PeerOutcome::Failed(reason) => assert!(reason.contains("connection reset")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_fails_pending_peers() {
        let peers: Vec<PeerInfo> = (1..=3).map(|b| peer(b, "")).collect();
        let source = Arc::new(ScriptedSource::new(
            peers.iter().map(|p| (p.clone(), Duration::ZERO, Reply::Hang)).collect(),
        ));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let report = discover(&peers, source, &cancel).await;
        assert_eq!(report.stats.failed, 3);
        assert!(report.stats.duration < PER_PEER_TIMEOUT);
        for (_, outcome) in &report.outcomes {
            assert_eq!(outcome, &PeerOutcome::Failed(Error::Cancelled.to_string()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_cancels_pending_peers() {
        let (a, b) = (peer(1, "fast"), peer(2, "stuck"));
        let source = Arc::new(ScriptedSource::new(vec![
            (a.clone(), Duration::from_millis(10), Reply::Params(custom(3))),
            (b.clone(), Duration::ZERO, Reply::Hang),
        ]));
        let interrupt = tokio::time::sleep(Duration::from_millis(200));

        let report = discover_until(&[a, b], source, DiscoveryOptions::default(), interrupt).await;
        assert_eq!(report.stats.with_config, 1);
        assert_eq!(report.outcomes[1].1, PeerOutcome::Failed(Error::Cancelled.to_string()));
        assert!(report.stats.duration < PER_PEER_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_released_after_discovery() {
        let a = peer(1, "a");
        let source = Arc::new(ScriptedSource::new(vec![(
            a.clone(),
            Duration::from_millis(10),
            Reply::Params(custom(2)),
        )]));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let interrupt = async move {
            let _ = rx.await;
        };

        let report = discover_until(&[a], source, DiscoveryOptions::default(), interrupt).await;
        assert_eq!(report.stats.with_config, 1);
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_no_peers() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let report = discover(&[], source, &CancellationToken::new()).await;
        assert_eq!(report.stats.total, 0);
        assert!(report.configs.is_empty());
    }
}

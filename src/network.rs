//! Run driver: wires roles into a network and executes it shot by shot.

use crate::core::Substrate;
use crate::node::{ClassicalSocket, EprSocket, Node, ProgramMeta, SocketKind};
use crate::role::{Role, RoleOutput, StepError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// What one node's role produced in one shot.
pub type NodeOutcome = Result<RoleOutput, StepError>;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Node name {0:?} is used by more than one role")]
    DuplicateNode(String),

    #[error("{node} declares a {kind} link to {peer}, which is not part of the network")]
    UnknownNode {
        node: String,
        peer: String,
        kind: SocketKind,
    },

    #[error("{node} declares a {kind} link to {peer}, but {peer} does not declare one back")]
    AsymmetricLink {
        node: String,
        peer: String,
        kind: SocketKind,
    },

    #[error("Shot {shot} did not finish within {timeout:?}")]
    Timeout { shot: usize, timeout: Duration },

    #[error("Node task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Outcome of every node in a single shot.
#[derive(Debug, Clone)]
pub struct ShotReport {
    pub shot: usize,
    /// Seed of this shot's substrate and node randomness
    pub seed: u64,
    pub outcomes: BTreeMap<String, NodeOutcome>,
}

impl ShotReport {
    pub fn output(&self, node: &str) -> Option<&RoleOutput> {
        self.outcomes.get(node)?.as_ref().ok()
    }

    pub fn bit(&self, node: &str) -> Option<bool> {
        match self.output(node)? {
            RoleOutput::Bit(b) => Some(*b),
            _ => None,
        }
    }

    pub fn error(&self, node: &str) -> Option<&StepError> {
        self.outcomes.get(node)?.as_ref().err()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(Result::is_ok)
    }

    /// Bit outputs concatenated in `order`; `None` if any node failed.
    pub fn bit_string(&self, order: &[String]) -> Option<String> {
        let mut key = String::new();
        for node in order {
            if let Some(bits) = self.outcomes.get(node)?.as_ref().ok()?.bit_string() {
                key.push_str(&bits);
            }
        }
        Some(key)
    }
}

/// Reports of all shots of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Node names in role order
    pub nodes: Vec<String>,
    pub shots: Vec<ShotReport>,
}

impl RunReport {
    /// Histogram of the joint bit outcome of every successful shot, keyed by
    /// the bit outputs concatenated in node order.
    pub fn counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for key in self.shots.iter().filter_map(|s| s.bit_string(&self.nodes)) {
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }

    /// Every output `node` produced, one per successful shot.
    pub fn outputs<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a RoleOutput> + 'a {
        self.shots.iter().filter_map(move |s| s.output(node))
    }

    /// Every failure across the run as `(shot, node, error)`.
    pub fn failures(&self) -> Vec<(usize, &str, &StepError)> {
        self.shots
            .iter()
            .flat_map(|s| {
                s.outcomes
                    .iter()
                    .filter_map(move |(node, o)| Some((s.shot, node.as_str(), o.as_ref().err()?)))
            })
            .collect()
    }
}

/// A validated set of roles, one per node.
#[derive(Debug, Clone)]
pub struct Simulation {
    roles: Vec<Role>,
    metas: Vec<ProgramMeta>,
    seed: Option<u64>,
    timeout: Option<Duration>,
}

impl Simulation {
    /// Checks that node names are unique and that every declared link points
    /// at a node declaring the same link back.
    pub fn new(roles: Vec<Role>) -> Result<Self, NetworkError> {
        let metas: Vec<ProgramMeta> = roles.iter().map(Role::meta).collect();

        let mut names = HashSet::new();
        for meta in &metas {
            if !names.insert(meta.name.as_str()) {
                return Err(NetworkError::DuplicateNode(meta.name.clone()));
            }
        }

        let by_name: HashMap<&str, &ProgramMeta> =
            metas.iter().map(|m| (m.name.as_str(), m)).collect();
        for meta in &metas {
            let links = [
                (SocketKind::Classical, &meta.csockets),
                (SocketKind::Entanglement, &meta.epr_sockets),
            ];
            for (kind, peers) in links {
                for peer in peers {
                    let other = by_name.get(peer.as_str()).ok_or_else(|| {
                        NetworkError::UnknownNode {
                            node: meta.name.clone(),
                            peer: peer.clone(),
                            kind,
                        }
                    })?;
                    let back = match kind {
                        SocketKind::Classical => &other.csockets,
                        SocketKind::Entanglement => &other.epr_sockets,
                    };
                    if !back.contains(&meta.name) {
                        return Err(NetworkError::AsymmetricLink {
                            node: meta.name.clone(),
                            peer: peer.clone(),
                            kind,
                        });
                    }
                }
            }
        }

        Ok(Self {
            roles,
            metas,
            seed: None,
            timeout: None,
        })
    }

    /// Makes runs reproducible: shot `i` uses `seed + i`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fails a shot that has not finished after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn node_names(&self) -> Vec<String> {
        self.metas.iter().map(|m| m.name.clone()).collect()
    }

    /// Runs the network `num_times` times, each on a fresh substrate.
    pub async fn run(&self, num_times: usize) -> Result<RunReport, NetworkError> {
        let base = self.seed.unwrap_or_else(|| rand::rng().random());
        info!(nodes = ?self.node_names(), shots = num_times, seed = base, "starting simulation");

        let mut shots = Vec::with_capacity(num_times);
        for shot in 0..num_times {
            shots.push(self.run_shot(shot, base.wrapping_add(shot as u64)).await?);
        }

        let report = RunReport {
            nodes: self.node_names(),
            shots,
        };
        let failed = report.shots.iter().filter(|s| !s.is_success()).count();
        if failed > 0 {
            warn!(failed, shots = num_times, "some shots had failing nodes");
        }
        Ok(report)
    }

    async fn run_shot(&self, shot: usize, seed: u64) -> Result<ShotReport, NetworkError> {
        let substrate = Substrate::seeded(seed);
        let mut node_seeds = StdRng::seed_from_u64(seed);

        let mut nodes: HashMap<String, Node> = self
            .metas
            .iter()
            .map(|meta| {
                let rng = StdRng::seed_from_u64(node_seeds.random());
                (meta.name.clone(), Node::new(meta, substrate.clone(), rng))
            })
            .collect();
        self.provision(&mut nodes);

        let mut tasks = JoinSet::new();
        for role in self.roles.iter().cloned() {
            let name = role.name();
            let Some(mut node) = nodes.remove(&name) else {
                continue;
            };
            tasks.spawn(async move {
                let outcome = role.run(&mut node).await;
                if let Err(err) = &outcome {
                    warn!(node = %name, %err, "role failed");
                }
                // Dropping the node closes its sockets so waiting peers fail too
                drop(node);
                (name, outcome)
            });
        }

        let collect = async {
            let mut outcomes = BTreeMap::new();
            while let Some(joined) = tasks.join_next().await {
                let (name, outcome) = joined?;
                outcomes.insert(name, outcome);
            }
            Ok::<_, NetworkError>(outcomes)
        };
        let outcomes = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, collect)
                .await
                .map_err(|_| NetworkError::Timeout { shot, timeout })??,
            None => collect.await?,
        };

        debug!(shot, seed, live_qubits = substrate.live_qubits(), "shot finished");
        Ok(ShotReport {
            shot,
            seed,
            outcomes,
        })
    }

    /// Connects both ends of every declared link, once per pair of nodes.
    fn provision(&self, nodes: &mut HashMap<String, Node>) {
        for meta in &self.metas {
            for peer in meta.csockets.iter().filter(|p| meta.name < **p) {
                let (here, there) = ClassicalSocket::pair(&meta.name, peer);
                if let Some(node) = nodes.get_mut(&meta.name) {
                    node.attach_classical(here);
                }
                if let Some(node) = nodes.get_mut(peer) {
                    node.attach_classical(there);
                }
            }
            for peer in meta.epr_sockets.iter().filter(|p| meta.name < **p) {
                let (here, there) = EprSocket::pair(&meta.name, peer);
                if let Some(node) = nodes.get_mut(&meta.name) {
                    node.attach_epr(here);
                }
                if let Some(node) = nodes.get_mut(peer) {
                    node.attach_epr(there);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::{Preparation, TeleportReceiver, TeleportSender};

    fn teleport_pair() -> Vec<Role> {
        vec![
            TeleportSender::new("Alice", "Bob", Preparation::one()).into(),
            TeleportReceiver::new("Bob", "Alice").into(),
        ]
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let roles = vec![
            TeleportSender::new("Alice", "Bob", Preparation::one()).into(),
            TeleportReceiver::new("Alice", "Bob").into(),
        ];
        assert!(matches!(
            Simulation::new(roles),
            Err(NetworkError::DuplicateNode(name)) if name == "Alice"
        ));
    }

    #[test]
    fn links_must_exist_and_reciprocate() {
        let roles = vec![TeleportSender::new("Alice", "Bob", Preparation::one()).into()];
        assert!(matches!(
            Simulation::new(roles),
            Err(NetworkError::UnknownNode { ref peer, .. }) if peer == "Bob"
        ));

        let roles = vec![
            TeleportSender::new("Alice", "Bob", Preparation::one()).into(),
            TeleportReceiver::new("Bob", "Charlie").into(),
            TeleportReceiver::new("Charlie", "Bob").into(),
        ];
        assert!(matches!(
            Simulation::new(roles),
            Err(NetworkError::AsymmetricLink { ref node, .. }) if node == "Alice"
        ));
    }

    #[tokio::test]
    async fn counts_join_bits_in_node_order() {
        let sim = Simulation::new(teleport_pair()).unwrap().with_seed(7);
        let report = sim.run(5).await.unwrap();
        assert_eq!(report.nodes, vec!["Alice".to_string(), "Bob".to_string()]);
        assert_eq!(report.counts().get("1"), Some(&5));
        assert!(report.failures().is_empty());
    }

    #[tokio::test]
    async fn stuck_shot_times_out() {
        // Both sides wait for corrections the other never sends
        let roles = vec![
            TeleportReceiver::new("Alice", "Bob").into(),
            TeleportReceiver::new("Bob", "Alice").into(),
        ];
        let sim = Simulation::new(roles)
            .unwrap()
            .with_seed(3)
            .with_timeout(Duration::from_millis(200));
        assert!(matches!(
            sim.run(2).await,
            Err(NetworkError::Timeout { shot: 0, .. })
        ));
    }

    #[tokio::test]
    async fn seeded_runs_repeat() {
        let roles = vec![
            TeleportSender::new("Alice", "Bob", Preparation::rotated(1.0)).into(),
            TeleportReceiver::new("Bob", "Alice").into(),
        ];
        let sim = Simulation::new(roles).unwrap().with_seed(42);
        let first = sim.run(20).await.unwrap().counts();
        let second = sim.run(20).await.unwrap().counts();
        assert_eq!(first, second);
    }
}

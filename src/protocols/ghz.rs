//! GHZ-state preparation across a star of nodes.
//!
//! The root holds the first qubit. Its first follower is linked either by a
//! shared entangled pair or by a distributed CNOT; every later follower is
//! linked by a distributed CNOT controlled by the root's qubit. With every
//! node measuring in the computational basis all outcomes agree. Measuring
//! some nodes after a Hadamard gives the X-basis settings used by
//! Mermin-inequality checks.

use crate::node::{Node, ProgramMeta};
use crate::role::{AtStep, RoleOutput, StepError};

/// How a follower is entangled with the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GhzLink {
    /// Root and follower share a freshly created entangled pair.
    Epr,
    /// The follower's |0> qubit is the target of a distributed CNOT.
    RemoteCnot,
}

#[derive(Debug, Clone)]
pub struct GhzRoot {
    pub name: String,
    pub followers: Vec<String>,
    /// Link used for the first follower; the rest always use a distributed CNOT.
    pub first_link: GhzLink,
    /// Apply H before measuring
    pub hadamard: bool,
    pub max_qubits: usize,
}

impl GhzRoot {
    pub fn new(name: impl Into<String>, followers: Vec<String>, first_link: GhzLink) -> Self {
        Self {
            name: name.into(),
            followers,
            first_link,
            hadamard: false,
            max_qubits: 2,
        }
    }

    pub fn with_hadamard(mut self, hadamard: bool) -> Self {
        self.hadamard = hadamard;
        self
    }

    pub fn meta(&self) -> ProgramMeta {
        ProgramMeta::new(&self.name, &self.followers, self.max_qubits)
    }

    pub async fn run(self, node: &mut Node) -> Result<RoleOutput, StepError> {
        let mut followers = self.followers.iter();

        let qubit = match (self.first_link, followers.next()) {
            (GhzLink::Epr, Some(first)) => node
                .generate_epr_send(first)
                .await
                .at_step(format!("entangle {first}"))?,
            (GhzLink::RemoteCnot, Some(first)) => {
                let qubit = node.new_qubit().at_step("prepare")?;
                qubit.h().at_step("prepare")?;
                node.distributed_cnot_source(&qubit, first)
                    .await
                    .at_step(format!("distributed-cnot {first}"))?;
                qubit
            }
            (_, None) => {
                let qubit = node.new_qubit().at_step("prepare")?;
                qubit.h().at_step("prepare")?;
                qubit
            }
        };

        for follower in followers {
            node.distributed_cnot_source(&qubit, follower)
                .await
                .at_step(format!("distributed-cnot {follower}"))?;
        }

        if self.hadamard {
            qubit.h().at_step("measure")?;
        }
        let result = qubit.measure().at_step("measure")?;
        Ok(RoleOutput::Bit(result))
    }
}

#[derive(Debug, Clone)]
pub struct GhzFollower {
    pub name: String,
    pub root: String,
    pub link: GhzLink,
    /// Apply H before measuring
    pub hadamard: bool,
    pub max_qubits: usize,
}

impl GhzFollower {
    pub fn new(name: impl Into<String>, root: impl Into<String>, link: GhzLink) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            link,
            hadamard: false,
            max_qubits: 2,
        }
    }

    pub fn with_hadamard(mut self, hadamard: bool) -> Self {
        self.hadamard = hadamard;
        self
    }

    pub fn meta(&self) -> ProgramMeta {
        ProgramMeta::new(&self.name, std::slice::from_ref(&self.root), self.max_qubits)
    }

    pub async fn run(self, node: &mut Node) -> Result<RoleOutput, StepError> {
        let qubit = match self.link {
            GhzLink::Epr => node
                .generate_epr_recv(&self.root)
                .await
                .at_step("entangle")?,
            GhzLink::RemoteCnot => {
                let qubit = node.new_qubit().at_step("prepare")?;
                node.distributed_cnot_target(&qubit, &self.root)
                    .await
                    .at_step("distributed-cnot")?;
                qubit
            }
        };

        if self.hadamard {
            qubit.h().at_step("measure")?;
        }
        let result = qubit.measure().at_step("measure")?;
        Ok(RoleOutput::Bit(result))
    }
}

/// Builds a GHZ star: `names[0]` is the root, the rest are followers.
pub fn ghz_roles(names: &[String], first_link: GhzLink, hadamard: &[String]) -> Vec<crate::Role> {
    let Some((root, followers)) = names.split_first() else {
        return Vec::new();
    };
    let wants_h = |name: &String| hadamard.contains(name);

    let mut roles = vec![
        GhzRoot::new(root, followers.to_vec(), first_link)
            .with_hadamard(wants_h(root))
            .into(),
    ];
    for (i, follower) in followers.iter().enumerate() {
        let link = if i == 0 { first_link } else { GhzLink::RemoteCnot };
        roles.push(
            GhzFollower::new(follower, root, link)
                .with_hadamard(wants_h(follower))
                .into(),
        );
    }
    roles
}

//! Distributed CNOT and the GHZ states built from it.

use qnetsim::protocols::{
    CnotControl, CnotTarget, ControlInput, GhzFollower, GhzLink, GhzRoot, ghz_roles,
};
use qnetsim::{Role, Simulation};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Two-node gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn distributed_cnot_truth_table() {
    let cases = [
        (ControlInput::Zero, false, "00"),
        (ControlInput::Zero, true, "01"),
        (ControlInput::One, false, "11"),
        (ControlInput::One, true, "10"),
    ];
    for (control, target, expected) in cases {
        let roles: Vec<Role> = vec![
            CnotControl::new("Alice", "Bob", control).into(),
            CnotTarget::new("Bob", "Alice", target).into(),
        ];
        let report = Simulation::new(roles)
            .unwrap()
            .with_seed(10)
            .run(10)
            .await
            .unwrap();
        assert_eq!(
            report.counts().get(expected),
            Some(&10),
            "control {control:?}, target {target}"
        );
    }
}

#[tokio::test]
async fn plus_control_yields_correlated_bits() {
    let roles: Vec<Role> = vec![
        CnotControl::new("Alice", "Bob", ControlInput::Plus).into(),
        CnotTarget::new("Bob", "Alice", false).into(),
    ];
    let counts = Simulation::new(roles)
        .unwrap()
        .with_seed(11)
        .run(200)
        .await
        .unwrap()
        .counts();

    assert_eq!(counts.get("01"), None);
    assert_eq!(counts.get("10"), None);
    let zeros = counts.get("00").copied().unwrap_or(0);
    let ones = counts.get("11").copied().unwrap_or(0);
    assert_eq!(zeros + ones, 200);
    assert!(zeros > 50 && ones > 50, "00: {zeros}, 11: {ones}");
}

// ---------------------------------------------------------------------------
// GHZ
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ghz_outcomes_agree_for_both_link_kinds() {
    for link in [GhzLink::Epr, GhzLink::RemoteCnot] {
        let roles = ghz_roles(&names(&["Alice", "Bob", "Charlie", "Dave"]), link, &[]);
        let counts = Simulation::new(roles)
            .unwrap()
            .with_seed(12)
            .run(100)
            .await
            .unwrap()
            .counts();

        let agree = counts.get("0000").copied().unwrap_or(0)
            + counts.get("1111").copied().unwrap_or(0);
        assert_eq!(agree, 100, "{link:?}: {counts:?}");
        assert_eq!(counts.len(), 2, "{link:?}: {counts:?}");
    }
}

#[tokio::test]
async fn ghz_xxx_parity_is_even() {
    let roles = ghz_roles(
        &names(&["Alice", "Bob", "Charlie"]),
        GhzLink::Epr,
        &names(&["Alice", "Bob", "Charlie"]),
    );
    let counts = Simulation::new(roles)
        .unwrap()
        .with_seed(13)
        .run(100)
        .await
        .unwrap()
        .counts();

    for (outcome, n) in &counts {
        let ones = outcome.chars().filter(|&c| c == '1').count();
        assert_eq!(ones % 2, 0, "{outcome} seen {n} times");
    }
}

#[tokio::test]
async fn ghz_zxx_setting_is_uncorrelated() {
    // One Z and two X measurements of a GHZ state give every outcome.
    let roles: Vec<Role> = vec![
        GhzRoot::new("Alice", names(&["Bob", "Charlie"]), GhzLink::Epr).into(),
        GhzFollower::new("Bob", "Alice", GhzLink::Epr)
            .with_hadamard(true)
            .into(),
        GhzFollower::new("Charlie", "Alice", GhzLink::RemoteCnot)
            .with_hadamard(true)
            .into(),
    ];
    let counts = Simulation::new(roles)
        .unwrap()
        .with_seed(14)
        .run(400)
        .await
        .unwrap()
        .counts();
    assert_eq!(counts.len(), 8, "{counts:?}");
}

use vnring::{plan, HashRing, RingSnapshot};

fn ring(nodes: &[&str]) -> HashRing<String> {
    let ring = HashRing::new();
    for node in nodes {
        ring.add(node.to_string()).unwrap();
    }
    ring
}

/// Checks that exactly the keys inside a transfer changed owner, and that
/// they moved as the transfer says.
fn assert_plan_matches_lookups(
    ring: &HashRing<String>,
    before: &RingSnapshot<String>,
    after: &RingSnapshot<String>,
    rebalance: &vnring::Rebalance<String>,
) {
    for i in 0..10_000 {
        let pos = ring.position(&format!("key:{i}"));
        let old = before.owner_of(pos).unwrap().node();
        let new = after.owner_of(pos).unwrap().node();
        match rebalance.transfer_for(pos) {
            Some(transfer) => {
                assert_eq!(&transfer.from, old);
                assert_eq!(&transfer.to, new);
            }
            None => assert_eq!(old, new, "position {pos} moved outside any transfer"),
        }
    }
}

#[test]
fn join_transfers_match_lookups() {
    let ring = ring(&["server:1", "server:2", "server:3"]);
    let before = ring.snapshot();
    let rebalance = ring.add("server:4".into()).unwrap();
    let after = ring.snapshot();

    assert!(!rebalance.is_empty());
    assert!(rebalance.transfers().iter().all(|t| t.to == "server:4"));
    assert_plan_matches_lookups(&ring, &before, &after, &rebalance);

    // The new node takes over exactly what it now serves.
    let served = ring
        .intervals(&"server:4".to_string())
        .unwrap()
        .iter()
        .map(|range| range.size())
        .sum::<u64>();
    assert_eq!(rebalance.moved_positions(), served);
}

#[test]
fn leave_transfers_match_lookups() {
    let ring = ring(&["server:1", "server:2", "server:3"]);
    let served = ring.intervals(&"server:2".to_string()).unwrap();
    let before = ring.snapshot();
    let rebalance = ring.remove(&"server:2".into()).unwrap();
    let after = ring.snapshot();

    assert!(rebalance.transfers().iter().all(|t| t.from == "server:2"));
    assert!(rebalance.transfers().iter().all(|t| t.to != "server:2"));
    assert_eq!(
        rebalance.moved_positions(),
        served.iter().map(|range| range.size()).sum::<u64>()
    );
    assert_plan_matches_lookups(&ring, &before, &after, &rebalance);
}

#[test]
fn each_added_vnode_takes_its_predecessor_arc() {
    let ring = ring(&["server:1", "server:2"]);
    let rebalance = ring.add("server:3".into()).unwrap();
    let after = ring.snapshot();

    for (idx, vnode) in after.vnodes().iter().enumerate() {
        if vnode.node() != "server:3" {
            continue;
        }
        let Some(arc) = after.arc(idx) else {
            continue;
        };
        let transfer = rebalance
            .transfer_for(arc.end)
            .expect("arc of a new virtual node is transferred");
        assert_eq!(transfer.to, "server:3");
        // The arc lies entirely within a single transfer.
        assert!(transfer.range.contains(&arc.end));
        assert!(arc.start == transfer.range.start || transfer.range.contains(&arc.start));
    }
}

#[test]
fn planner_works_on_arbitrary_snapshots() {
    let ring = ring(&["server:1", "server:2"]);
    let start = ring.snapshot();
    ring.add("server:3".into()).unwrap();
    ring.add("server:4".into()).unwrap();
    ring.remove(&"server:1".into()).unwrap();
    let end = ring.snapshot();

    let rebalance = plan::transfers(&start, &end);
    assert_plan_matches_lookups(&ring, &start, &end, &rebalance);
}

#[test]
fn first_join_and_last_leave_move_nothing() {
    let ring = HashRing::<String>::new();
    assert!(ring.add("server:1".into()).unwrap().is_empty());
    assert!(ring.remove(&"server:1".into()).unwrap().is_empty());
}

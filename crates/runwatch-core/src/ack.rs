//! Acknowledgment matching.
//!
//! An acknowledgment is relevant to a run when its device set is empty or
//! names one of the run's build flavors, and its branch set is empty or names
//! one of the run's branches. A relevant rule with no test case names covers
//! every candidate.

use crate::model::{Acknowledgment, DeviceInfo};
use std::collections::BTreeSet;

/// Split of failure names into acknowledged and remaining.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub acknowledged: BTreeSet<String>,
    pub remaining: BTreeSet<String>,
}

pub fn is_relevant(ack: &Acknowledgment, devices: &[DeviceInfo]) -> bool {
    let device_ok = ack.devices.is_empty()
        || devices.iter().any(|d| ack.devices.contains(&d.build_flavor));
    let branch_ok =
        ack.branches.is_empty() || devices.iter().any(|d| ack.branches.contains(&d.branch));
    device_ok && branch_ok
}

/// Partitions `candidates` by whether any relevant acknowledgment covers them.
pub fn separate_acknowledged<'a, I>(
    candidates: I,
    devices: &[DeviceInfo],
    acks: &[Acknowledgment],
) -> Partition
where
    I: IntoIterator<Item = &'a String>,
{
    let relevant: Vec<&Acknowledgment> = acks.iter().filter(|a| is_relevant(a, devices)).collect();

    let mut out = Partition::default();
    for name in candidates {
        let covered = relevant
            .iter()
            .any(|a| a.test_case_names.is_empty() || a.test_case_names.contains(name));
        if covered {
            out.acknowledged.insert(name.clone());
        } else {
            out.remaining.insert(name.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn device(branch: &str, flavor: &str) -> DeviceInfo {
        DeviceInfo {
            branch: branch.into(),
            build_flavor: flavor.into(),
            ..Default::default()
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn ack(devices: &[&str], branches: &[&str], cases: &[&str]) -> Acknowledgment {
        Acknowledgment {
            test_name: "t".into(),
            devices: set(devices),
            branches: set(branches),
            test_case_names: set(cases),
            ..Default::default()
        }
    }

    #[test]
    fn blanket_ack_suppresses_everything() {
        let candidates = set(&["a", "b", "c"]);
        let p = separate_acknowledged(&candidates, &[device("main", "walleye")], &[ack(&[], &[], &[])]);
        assert_eq!(p.acknowledged, candidates);
        assert!(p.remaining.is_empty());
    }

    #[test]
    fn case_scoped_ack_takes_intersection() {
        let candidates = set(&["a", "b"]);
        let p = separate_acknowledged(&candidates, &[device("main", "walleye")], &[ack(&[], &[], &["b", "z"])]);
        assert_eq!(p.acknowledged, set(&["b"]));
        assert_eq!(p.remaining, set(&["a"]));
    }

    #[test]
    fn branch_mismatch_is_irrelevant() {
        let candidates = set(&["a"]);
        let p = separate_acknowledged(&candidates, &[device("main", "walleye")], &[ack(&[], &["release"], &[])]);
        assert!(p.acknowledged.is_empty());
        assert_eq!(p.remaining, candidates);
    }

    #[test]
    fn device_and_branch_must_both_match() {
        let devices = [device("main", "walleye"), device("release", "taimen")];
        assert!(is_relevant(&ack(&["taimen"], &["main"], &[]), &devices));
        assert!(!is_relevant(&ack(&["sailfish"], &["main"], &[]), &devices));
    }

    #[test]
    fn no_devices_only_matches_unrestricted_acks() {
        assert!(is_relevant(&ack(&[], &[], &[]), &[]));
        assert!(!is_relevant(&ack(&["walleye"], &[], &[]), &[]));
    }

    proptest! {
        #[test]
        fn partition_is_exact(
            candidates in proptest::collection::btree_set("[a-e]", 0..6),
            ack_cases in proptest::collection::vec(proptest::collection::btree_set("[a-e]", 0..3), 0..3),
            branch_scoped in any::<bool>(),
        ) {
            let acks: Vec<Acknowledgment> = ack_cases
                .into_iter()
                .map(|cases| Acknowledgment {
                    test_name: "t".into(),
                    branches: if branch_scoped { set(&["main"]) } else { BTreeSet::new() },
                    test_case_names: cases,
                    ..Default::default()
                })
                .collect();
            let p = separate_acknowledged(&candidates, &[device("main", "walleye")], &acks);

            let union: BTreeSet<String> = p.acknowledged.union(&p.remaining).cloned().collect();
            prop_assert_eq!(union, candidates.clone());
            prop_assert!(p.acknowledged.is_disjoint(&p.remaining));
        }
    }
}

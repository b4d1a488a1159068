//! Delete ordering for machine subsets.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::machine::Machine;

/// Which machines to remove first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeletePolicy {
    /// Oldest creation timestamp first.
    Oldest,

    /// Newest creation timestamp first.
    Newest,

    /// Uniformly shuffled.
    Random,

    /// Any other value. Ordered like [`DeletePolicy::Random`].
    #[serde(other)]
    Unrecognized,
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Oldest => "Oldest",
            Self::Newest => "Newest",
            Self::Random => "Random",
            Self::Unrecognized => "Unrecognized",
        };
        f.write_str(s)
    }
}

/// Order machines according to a delete policy.
///
/// An unset or unrecognized policy shuffles.
pub fn order_machines<R>(
    mut machines: Vec<Machine>,
    policy: Option<DeletePolicy>,
    rng: &mut R,
) -> Vec<Machine>
where
    R: Rng + ?Sized,
{
    match policy {
        Some(DeletePolicy::Oldest) => order_by_oldest(&mut machines),
        Some(DeletePolicy::Newest) => order_by_newest(&mut machines),
        _ => order_random(&mut machines, rng),
    }
    machines
}

pub fn order_by_oldest(machines: &mut [Machine]) {
    machines.sort_by_key(|m| m.creation_timestamp);
}

pub fn order_by_newest(machines: &mut [Machine]) {
    machines.sort_by(|a, b| b.creation_timestamp.cmp(&a.creation_timestamp));
}

pub fn order_random<R>(machines: &mut [Machine], rng: &mut R)
where
    R: Rng + ?Sized,
{
    machines.shuffle(rng);
}

/// Move machines with the delete annotation to the front.
///
/// Stable: relative order inside each group is kept.
pub fn order_by_delete_annotation(machines: &mut [Machine]) {
    machines.sort_by_key(|m| !m.has_delete_annotation());
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn machines() -> Vec<Machine> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        vec![
            Machine::new("b", base + Duration::hours(2)),
            Machine::new("a", base),
            Machine::new("c", base + Duration::hours(1)),
            Machine::new("d", base + Duration::hours(3)),
        ]
    }

    fn ids(machines: &[Machine]) -> Vec<&str> {
        machines.iter().map(|m| m.provider_id.as_str()).collect()
    }

    #[test]
    fn test_oldest_first() {
        let mut rng = StdRng::seed_from_u64(1);
        let ordered = order_machines(machines(), Some(DeletePolicy::Oldest), &mut rng);
        assert_eq!(ids(&ordered), vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_newest_first() {
        let mut rng = StdRng::seed_from_u64(1);
        let ordered = order_machines(machines(), Some(DeletePolicy::Newest), &mut rng);
        assert_eq!(ids(&ordered), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_random_is_seed_deterministic_permutation() {
        let first = order_machines(
            machines(),
            Some(DeletePolicy::Random),
            &mut StdRng::seed_from_u64(42),
        );
        let second = order_machines(machines(), None, &mut StdRng::seed_from_u64(42));
        assert_eq!(ids(&first), ids(&second));

        let mut sorted = ids(&first);
        sorted.sort();
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_unrecognized_policy_shuffles_like_random() {
        let random = order_machines(
            machines(),
            Some(DeletePolicy::Random),
            &mut StdRng::seed_from_u64(9),
        );
        let unrecognized = order_machines(
            machines(),
            Some(DeletePolicy::Unrecognized),
            &mut StdRng::seed_from_u64(9),
        );
        assert_eq!(ids(&random), ids(&unrecognized));
    }

    #[test]
    fn test_delete_annotation_moves_to_front_stably() {
        let mut ms = machines();
        order_by_oldest(&mut ms);
        ms[1] = ms[1].clone().with_delete_annotation();
        ms[3] = ms[3].clone().with_delete_annotation();

        order_by_delete_annotation(&mut ms);
        assert_eq!(ids(&ms), vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn test_delete_policy_deserialize() {
        let oldest: DeletePolicy = serde_json::from_str("\"Oldest\"").unwrap();
        let other: DeletePolicy = serde_json::from_str("\"LeastLoaded\"").unwrap();
        assert_eq!(oldest, DeletePolicy::Oldest);
        assert_eq!(other, DeletePolicy::Unrecognized);
    }
}

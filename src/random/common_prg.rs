//! Keyed PRGs shared between specific sets of parties.
//!
//! Grounded in `original_source/include/core/random/permutation_manager.h`'s
//! `setup_dm_pair` helper (one shared key wrapped in two `CommonPRG`
//! instances) generalized to arbitrary relative-rank peers and groups, per
//! the distilled specification's §4.3.

use crate::random::prg::DeterministicPrg;
use itertools::Itertools;
use std::collections::BTreeMap;

/// A deterministic PRG plus the rank of the local party. Every party that
/// holds the same key produces the identical byte stream.
pub struct CommonPrg {
    rank: usize,
    prg: Box<dyn DeterministicPrg>,
}

impl CommonPrg {
    /// Wrap `prg` as this party's view of a common PRG, given this party's
    /// rank.
    pub fn new(rank: usize, prg: Box<dyn DeterministicPrg>) -> Self {
        CommonPrg { rank, prg }
    }

    /// This party's rank.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Draw `n` pseudorandom bytes.
    pub fn next_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        self.prg.fill_bytes(&mut buf);
        buf
    }

    /// Draw a `u64`, little-endian.
    pub fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.prg.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    /// Rejection-sample a uniform value in `[0, bound)` using masked words
    /// drawn from the PRG, consuming bytes even on rejection (the same
    /// discipline the Fisher-Yates shuffle in
    /// [`crate::random::correlation::permutation`] relies on).
    pub fn next_below(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "bound must be positive");
        if bound == 1 {
            let _ = self.next_u64();
            return 0;
        }
        let mask = (bound - 1).next_power_of_two() - 1;
        loop {
            let candidate = (self.next_u64() as usize) & mask;
            if candidate < bound {
                return candidate;
            }
        }
    }
}

/// A set of party ranks sharing a keyed PRG (a "group" in the spec's
/// terminology). Stored sorted so it can be used as a map key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(Vec<usize>);

impl GroupKey {
    /// Build a group key from an arbitrary set of ranks, normalizing order.
    pub fn new(mut ranks: Vec<usize>) -> Self {
        ranks.sort_unstable();
        ranks.dedup();
        GroupKey(ranks)
    }

    /// The member ranks, in sorted order.
    pub fn ranks(&self) -> &[usize] {
        &self.0
    }

    /// The lowest rank in the group -- the seed-agreement initiator.
    pub fn leader(&self) -> usize {
        self.0[0]
    }
}

/// Holds every keyed common PRG this party participates in: one per
/// relative-rank peer, and one per named group. Populated at setup by a
/// seed-agreement protocol (the lowest-rank member of each group samples a
/// key and ships it to every other member over the communicator).
pub struct CommonPrgManager {
    by_relative_rank: BTreeMap<i64, CommonPrg>,
    by_group: BTreeMap<GroupKey, CommonPrg>,
}

impl CommonPrgManager {
    /// An empty manager; populated via [`Self::install_relative_rank`] and
    /// [`Self::install_group`] during setup.
    pub fn new() -> Self {
        CommonPrgManager {
            by_relative_rank: BTreeMap::new(),
            by_group: BTreeMap::new(),
        }
    }

    /// Install the common PRG shared with the peer at `relative_rank`
    /// (signed offset modulo party count).
    pub fn install_relative_rank(&mut self, relative_rank: i64, prg: CommonPrg) {
        self.by_relative_rank.insert(relative_rank, prg);
    }

    /// Install the common PRG shared by `group`.
    pub fn install_group(&mut self, group: GroupKey, prg: CommonPrg) {
        self.by_group.insert(group, prg);
    }

    /// Borrow the common PRG shared with the peer at `relative_rank`.
    pub fn relative_rank(&mut self, relative_rank: i64) -> &mut CommonPrg {
        self.by_relative_rank
            .get_mut(&relative_rank)
            .unwrap_or_else(|| panic!("no common PRG installed for relative rank {relative_rank}"))
    }

    /// Borrow the common PRG shared by `group`.
    pub fn group(&mut self, group: &GroupKey) -> &mut CommonPrg {
        self.by_group
            .get_mut(group)
            .unwrap_or_else(|| panic!("no common PRG installed for group {group:?}"))
    }
}

impl Default for CommonPrgManager {
    fn default() -> Self {
        Self::new()
    }
}

/// The canonical groups for `num_parties` parties tolerating `adversaries`
/// corruptions: for `num_parties >= 4` with a single adversary, the two
/// disjoint halves `{0..num_parties/2}` and `{num_parties/2..num_parties}`;
/// otherwise every `(num_parties - adversaries)`-sized subset of parties.
/// The "everyone" group is always appended.
pub fn canonical_groups(num_parties: usize, adversaries: usize) -> Vec<GroupKey> {
    let mut groups = Vec::new();
    if num_parties >= 4 && adversaries == 1 {
        let half = num_parties / 2;
        groups.push(GroupKey::new((0..half).collect()));
        groups.push(GroupKey::new((half..num_parties).collect()));
    } else {
        let r = num_parties - adversaries;
        for combo in (0..num_parties).combinations(r) {
            groups.push(GroupKey::new(combo));
        }
        groups.sort();
        groups.dedup();
    }
    groups.push(GroupKey::new((0..num_parties).collect()));
    groups
}

/// For replicated sharing with replication factor `r` over `num_parties`
/// parties, the global additive-term indices each party rank holds: party
/// `p` holds terms `{p, p+1, .., p+r-1} mod num_parties`, matching every
/// `secret_share` implementation's term attribution.
pub fn party_share_mapping(num_parties: usize, r: usize) -> Vec<Vec<usize>> {
    (0..num_parties)
        .map(|p| (0..r).map(|i| (p + i) % num_parties).collect())
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::prg::AesPrg;

    #[test]
    fn relative_rank_prg_round_trips() {
        let mut mgr = CommonPrgManager::new();
        mgr.install_relative_rank(1, CommonPrg::new(0, Box::new(AesPrg::new([5u8; 32]))));
        let bytes = mgr.relative_rank(1).next_bytes(16);
        assert_eq!(bytes.len(), 16);
    }

    #[test]
    fn group_members_with_same_key_agree() {
        let key = [42u8; 32];
        let mut a = CommonPrg::new(0, Box::new(AesPrg::new(key)));
        let mut b = CommonPrg::new(1, Box::new(AesPrg::new(key)));
        assert_eq!(a.next_bytes(32), b.next_bytes(32));
    }

    #[test]
    fn next_below_stays_in_range() {
        let mut prg = CommonPrg::new(0, Box::new(AesPrg::new([1u8; 32])));
        for _ in 0..1000 {
            let v = prg.next_below(7);
            assert!(v < 7);
        }
    }

    #[test]
    fn group_key_normalizes_order() {
        let g1 = GroupKey::new(vec![2, 0, 1]);
        let g2 = GroupKey::new(vec![0, 1, 2]);
        assert_eq!(g1, g2);
        assert_eq!(g1.leader(), 0);
    }

    #[test]
    fn canonical_groups_for_four_parties_are_disjoint_halves_plus_everyone() {
        let groups = canonical_groups(4, 1);
        assert_eq!(
            groups,
            vec![
                GroupKey::new(vec![0, 1]),
                GroupKey::new(vec![2, 3]),
                GroupKey::new(vec![0, 1, 2, 3]),
            ]
        );
    }

    #[test]
    fn canonical_groups_for_two_parties_are_all_singletons_plus_everyone() {
        let groups = canonical_groups(2, 1);
        assert_eq!(
            groups,
            vec![GroupKey::new(vec![0]), GroupKey::new(vec![1]), GroupKey::new(vec![0, 1])]
        );
    }

    #[test]
    fn canonical_groups_for_three_parties_are_all_pairs_plus_everyone() {
        let groups = canonical_groups(3, 1);
        assert_eq!(
            groups,
            vec![
                GroupKey::new(vec![0, 1]),
                GroupKey::new(vec![0, 2]),
                GroupKey::new(vec![1, 2]),
                GroupKey::new(vec![0, 1, 2]),
            ]
        );
    }

    #[test]
    fn party_share_mapping_matches_replicated_term_attribution() {
        assert_eq!(
            party_share_mapping(4, 3),
            vec![
                vec![0, 1, 2],
                vec![1, 2, 3],
                vec![2, 3, 0],
                vec![3, 0, 1],
            ]
        );
    }
}

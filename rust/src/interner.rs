//! Dense integer keys for the string ids of a run.
//!
//! Tasks and resources are keyed by their position in an id-sorted list, so
//! an index orders the same way as the id it stands for. Ranks become opaque
//! tokens that only support equality.

use rustc_hash::FxHashMap;

use crate::models::Rank;

/// A rank reduced to an integer for exact token comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RankToken(u32);

/// Position lookup over a list of unique ids.
#[derive(Clone, Debug, Default)]
pub struct IdIndex {
    positions: FxHashMap<String, usize>,
}

impl IdIndex {
    /// Index `ids` by position. The first repeated id is returned as the
    /// error.
    pub fn from_unique<'a>(ids: impl IntoIterator<Item = &'a str>) -> Result<Self, String> {
        let ids = ids.into_iter();
        let mut positions =
            FxHashMap::with_capacity_and_hasher(ids.size_hint().0, Default::default());
        for (pos, id) in ids.enumerate() {
            if positions.insert(id.to_string(), pos).is_some() {
                return Err(id.to_string());
            }
        }
        Ok(Self { positions })
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }
}

/// Hands out rank tokens in first-seen order.
#[derive(Clone, Debug, Default)]
pub struct RankTable {
    tokens: FxHashMap<String, RankToken>,
}

impl RankTable {
    pub fn intern(&mut self, rank: &Rank) -> RankToken {
        if let Some(&token) = self.tokens.get(rank.as_str()) {
            return token;
        }
        let token = RankToken(self.tokens.len() as u32);
        self.tokens.insert(rank.as_str().to_string(), token);
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_follow_input() {
        let index = IdIndex::from_unique(["A", "B", "C"]).unwrap();
        assert_eq!(index.get("A"), Some(0));
        assert_eq!(index.get("C"), Some(2));
        assert_eq!(index.get("D"), None);
    }

    #[test]
    fn test_repeated_id_reported() {
        let err = IdIndex::from_unique(["A", "B", "A", "B"]).unwrap_err();
        assert_eq!(err, "A");
    }

    #[test]
    fn test_rank_tokens_are_exact() {
        let mut ranks = RankTable::default();
        let welder = ranks.intern(&Rank::new("welder"));
        assert_eq!(ranks.intern(&Rank::new("welder")), welder);
        assert_ne!(ranks.intern(&Rank::new("Welder")), welder);
        assert_ne!(ranks.intern(&Rank::new("crane")), welder);
    }
}

use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
    sync::Arc,
};

mod error;
pub use error::PositionError;

use crate::ContigOrder;

/// An immutable, 1-based genomic coordinate: a contig name, a position within it,
/// and a reference to the [`ContigOrder`] that gives contig names a total order.
///
/// Two `Position`s are only ever meaningfully compared if they were built against
/// the *same* `ContigOrder` instance (checked by `Arc` pointer identity). Comparing
/// positions drawn from two different shards-table scans is a programmer error and
/// panics rather than silently returning a meaningless answer.
#[derive(Debug, Clone)]
pub struct Position {
    contig: Arc<str>,
    pos: u32,
    order: Arc<ContigOrder>,
}

impl Position {
    pub fn new(contig: impl AsRef<str>, pos: u32, order: Arc<ContigOrder>) -> Result<Self, PositionError> {
        if pos == 0 {
            return Err(PositionError::NonPositive(pos));
        }
        Ok(Self { contig: Arc::from(contig.as_ref()), pos, order })
    }

    #[must_use]
    pub fn contig(&self) -> &str {
        &self.contig
    }

    #[must_use]
    pub fn pos(&self) -> u32 {
        self.pos
    }

    #[must_use]
    pub fn order(&self) -> &Arc<ContigOrder> {
        &self.order
    }

    /// Same contig and `ContigOrder`, different position. Used to build a cursor's
    /// "current position" from a freshly-parsed record without re-resolving the contig.
    pub fn with_pos(&self, pos: u32) -> Result<Self, PositionError> {
        if pos == 0 {
            return Err(PositionError::NonPositive(pos));
        }
        Ok(Self { contig: Arc::clone(&self.contig), pos, order: Arc::clone(&self.order) })
    }

    fn same_order(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.order, &other.order)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.contig, self.pos)
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        *self.contig == *other.contig && self.pos == other.pos
    }
}

impl Eq for Position {}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.contig.hash(state);
        self.pos.hash(state);
    }
}

impl Ord for Position {
    /// Same contig: compare `pos`. Different contig: compare `ContigOrder` rank.
    /// Equal positions always compare equal, even across distinct `ContigOrder`
    /// instances -- only a *differing* comparison requires a shared `ContigOrder`.
    fn cmp(&self, other: &Self) -> Ordering {
        if self == other {
            return Ordering::Equal;
        }
        assert!(
            self.same_order(other),
            "comparing Positions built from different ContigOrder instances ({} vs {})",
            self, other
        );
        if *self.contig == *other.contig {
            return self.pos.cmp(&other.pos);
        }
        let self_rank = self.order.index_of(&self.contig)
            .unwrap_or_else(|| panic!("contig '{}' missing from its own ContigOrder", self.contig));
        let other_rank = self.order.index_of(&other.contig)
            .unwrap_or_else(|| panic!("contig '{}' missing from its own ContigOrder", other.contig));
        self_rank.cmp(&other_rank)
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

//! Block-time units of the blockchain test node

use nutype::nutype;
use std::fmt;

/// Whole seconds since the Unix epoch, the unit of a block timestamp
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    AsRef,
    Display,
    From
))]
pub struct NodeTimestamp(u64);

impl NodeTimestamp {
    /// Floor milliseconds to whole seconds.
    ///
    /// Instants before 1970 have no block-time representation.
    pub fn from_epoch_millis(millis: i64) -> Option<Self> {
        u64::try_from(millis.div_euclid(1000)).ok().map(Self::new)
    }

    pub fn as_secs(&self) -> u64 {
        self.into_inner()
    }

    /// The smallest timestamp the node will accept after this one
    pub fn next(&self) -> Self {
        Self::new(self.into_inner().saturating_add(1))
    }

    /// `0x`-prefixed lowercase hex, the quantity encoding of Ethereum JSON-RPC
    pub fn to_quantity(&self) -> String {
        format!("{:#x}", self.into_inner())
    }
}

/// Number of blocks to mine in one request
#[nutype(
    validate(greater_or_equal = 1),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, AsRef, Display)
)]
pub struct BlockCount(u64);

impl BlockCount {
    /// Committing a pending timestamp always takes exactly one block
    pub fn one() -> Self {
        Self::try_new(1).expect("1 is a valid block count")
    }

    pub fn to_quantity(&self) -> String {
        format!("{:#x}", self.into_inner())
    }
}

/// Number and timestamp of a mined block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub timestamp: NodeTimestamp,
}

impl fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block #{} @ {}", self.number, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_of_whole_seconds() {
        let ts = NodeTimestamp::from_epoch_millis(1_893_456_000_000).unwrap();
        assert_eq!(ts.as_secs(), 1_893_456_000);
    }

    #[test]
    fn test_floor_discards_fractional_seconds() {
        let ts = NodeTimestamp::from_epoch_millis(1_893_456_000_999).unwrap();
        assert_eq!(ts.as_secs(), 1_893_456_000);
    }

    #[test]
    fn test_pre_epoch_is_unrepresentable() {
        assert!(NodeTimestamp::from_epoch_millis(-1).is_none());
        assert!(NodeTimestamp::from_epoch_millis(0).is_some());
    }

    #[test]
    fn test_quantity_encoding() {
        assert_eq!(NodeTimestamp::new(1_893_456_000).to_quantity(), "0x70dbd880");
        assert_eq!(BlockCount::one().to_quantity(), "0x1");
    }

    #[test]
    fn test_block_count_rejects_zero() {
        assert!(BlockCount::try_new(0).is_err());
        assert_eq!(*BlockCount::try_new(3).unwrap().as_ref(), 3);
    }

    #[test]
    fn test_next_is_one_second_later() {
        assert_eq!(NodeTimestamp::new(10).next(), NodeTimestamp::new(11));
    }
}

//! Correlated-randomness pipeline: deterministic/common PRGs, zero-sharing
//! generation, and the OLE/OT/Beaver/permutation correlation generators
//! built on top of them.

pub mod common_prg;
pub mod correlation;
pub mod prg;
pub mod zero_sharing;

pub use common_prg::{CommonPrg, CommonPrgManager, GroupKey};
pub use prg::{AesPrg, DeterministicPrg, UrandomPrg, XChaChaPrg, MAX_PRG_QUERY_BYTES};

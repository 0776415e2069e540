//! Correlation generators: OLE/OT, Beaver triples, pooled amortization, and
//! sharded permutations.

pub mod beaver;
pub mod ole;
pub mod permutation;
pub mod pooled;

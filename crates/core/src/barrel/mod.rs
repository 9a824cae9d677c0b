//! Binary barrel layer: the on-disk `.bin`/`.idx` codec and the serving
//! index that makes posting-list retrieval O(1) per term.

/// Build-side conversion of textual barrels to binary pairs.
pub mod build;
/// Block and offset-map encoding/decoding.
pub mod codec;
/// Barrel serving with delta merge.
pub mod reader;

pub use build::{convert_all_barrels, convert_barrel};
pub use codec::{IdxEntry, PostingBlock};
pub use reader::BarrelIndex;

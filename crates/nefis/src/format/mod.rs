//! On-disk format: geometry constants, file header and byte-order codec.

pub mod codec;
pub mod header;
pub mod layout;

pub use codec::{Codec, Coding, Element, ElementType, Endian};
pub use header::{FileHeader, FileKind, MERGED_HEADER_LEN, SPLIT_HEADER_LEN};
pub use layout::{
    align, FormatVersion, ALIGNMENT, BUCKETS_PER_CATALOG, MAX_ATTRIBUTES, MAX_DESC, MAX_DIM,
    MAX_NAME, MAX_TYPE, NIL, TRIE_DEPTH, TRIE_FANOUT,
};

//! Size limits applied when building and decoding documents.
//!
//! Decoders check every length prefix against these before allocating.

/// Default maximum number of elements registered in one document.
pub const MAX_ELEMENTS: usize = 1 << 24;

/// Maximum number of attributes on one element.
pub const MAX_ATTRIBUTES: usize = 1 << 16;

/// Maximum byte length of a single string.
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Maximum number of items in one array attribute.
pub const MAX_ARRAY_LEN: usize = 1 << 26;

/// Maximum byte length of one binary blob.
pub const MAX_BINARY_LEN: usize = 256 * 1024 * 1024;

/// Maximum number of entries in the binary string dictionary.
pub const MAX_DICT_SIZE: usize = 1 << 24;

/// Maximum number of prefix blocks read from a binary v9 stream.
pub const MAX_PREFIX_BLOCKS: usize = 1024;

/// Maximum nesting of inline element blocks in keyvalues2 text.
pub const MAX_NESTING_DEPTH: usize = 512;

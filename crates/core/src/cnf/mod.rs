use std::sync::LazyLock;

/// The publicly visible name of the engine.
pub const ENGINE_NAME: &str = "Trellis";

/// Specifies how deeply nested a request may be before tree construction
/// returns an error.
pub static MAX_TREE_DEPTH: LazyLock<u32> = lazy_env_parse!("TRELLIS_MAX_TREE_DEPTH", u32, 32);

/// Specifies the maximum number of concrete entities a union or interface
/// target may fan out to within a single composite operation.
pub static MAX_COMPOSITE_FANOUT: LazyLock<usize> =
	lazy_env_parse!("TRELLIS_MAX_COMPOSITE_FANOUT", usize, 100);

/// The default number of edges returned by a connection read when the
/// request does not specify a page size.
pub static DEFAULT_PAGE_SIZE: LazyLock<u32> = lazy_env_parse!("TRELLIS_DEFAULT_PAGE_SIZE", u32, 50);

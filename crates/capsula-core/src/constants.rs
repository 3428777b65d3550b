/// Group that capsules are saved into when none is given.
pub const DEFAULT_GROUP: &str = "saved_functions";

/// First-line prefix of the capture marker stripped by the normalizer.
pub const DEFAULT_MARKER: &str = "@capsule";

/// A trailing parameter with this name collects keyword arguments that
/// match no other parameter.
pub const KWARGS_PARAM: &str = "kwargs";

/// Section header for the externally supplied part of a docstring.
pub const DESCRIPTION_SECTION: &str = "== description ==";

/// Section header for the doc comments found on the function itself.
pub const DOCUMENTATION_SECTION: &str = "== documentation ==";

// Names bound in every per-call execution context.
pub const CONTEXT_CONTAINER: &str = "container";
pub const CONTEXT_FUNCTION: &str = "function";
pub const CONTEXT_ARGS: &str = "args";
pub const CONTEXT_KWARGS: &str = "kwargs";

/// Tracing target for `print` and `debug` output of capsule scripts.
pub const SCRIPT_LOG_TARGET: &str = "capsula::script";

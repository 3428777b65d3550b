//! Function capsules.
//!
//! A capsule is a self-contained script function persisted together with
//! its calling metadata: name, signature, docstring and literal default
//! arguments. Capsules are captured from source text, stored by a container
//! collaborator, and rebuilt into a sandboxed callable that sees nothing but
//! its own arguments.
//!
//! No file I/O happens here; persistence lives in `capsula-store`.

pub mod capture;
pub mod constants;
pub mod error;
pub mod literal;
pub mod normalize;
pub mod record;
pub mod sandbox;

pub use capture::{CaptureConfig, Callable, NativeFn, NativeFnPtr, ScriptFn, register_capsule};
pub use constants::{DEFAULT_GROUP, DEFAULT_MARKER, KWARGS_PARAM};
pub use error::{
    CaptureError, CapsuleError, CodecError, InvokeError, ReconstructionError, Result,
};
pub use literal::{Literal, decode, decode_args, decode_kwargs, encode, encode_checked};
pub use normalize::normalize;
pub use record::{CapsuleRecord, compose_docstring, format_signature};
pub use sandbox::{Capsule, ExecutionContext, PositionalPolicy, SandboxOptions};

pub use rhai;
pub use rhai::{Dynamic, Map};

use rhai::EvalAltResult;
use thiserror::Error;

/// Failures of the literal text codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The text is not a well-formed literal.
    #[error("malformed literal: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Decoding succeeded but produced a different kind of literal than expected.
    #[error("expected {expected} literal, found {found}")]
    WrongShape {
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors raised while turning a callable into a capsule record.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The callable has no retrievable, introspectable source text.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// A default argument has no faithful literal form.
    #[error("default {what} is not literal-safe: {reason}")]
    NonLiteralValue { what: String, reason: String },
}

/// Errors raised while rebuilding a callable from stored source.
#[derive(Debug, Error)]
pub enum ReconstructionError {
    #[error("capsule `{function}` does not parse: {message}")]
    Parse { function: String, message: String },

    #[error("capsule `{function}` failed while executing its source: {source}")]
    Execution {
        function: String,
        #[source]
        source: Box<EvalAltResult>,
    },

    /// The source ran but did not define the recorded entry point.
    #[error("source does not define function `{0}`")]
    MissingFunction(String),

    #[error("function `{0}` declares no parameter to receive the container")]
    NoContainerParameter(String),
}

/// Errors raised by a single invocation of a built capsule.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// Positional arguments were supplied to a capsule whose positionals are locked.
    #[error(
        "`{function}` received {supplied} positional argument(s); positional arguments are \
         fixed at capture time, pass overrides as keyword arguments instead"
    )]
    ArgumentOverride { function: String, supplied: usize },

    #[error("`{function}` takes {accepted} positional argument(s) but {given} were bound")]
    TooManyPositional {
        function: String,
        accepted: usize,
        given: usize,
    },

    #[error("`{function}` is missing a value for parameter `{parameter}`")]
    MissingArgument { function: String, parameter: String },

    #[error("`{function}` got multiple values for parameter `{parameter}`")]
    DuplicateArgument { function: String, parameter: String },

    #[error("`{function}` got unexpected keyword argument(s): {}", names.join(", "))]
    UnexpectedKeyword { function: String, names: Vec<String> },

    /// Error raised from inside the sandboxed script, passed through unmodified.
    #[error(transparent)]
    Script(Box<EvalAltResult>),
}

impl InvokeError {
    /// True when the script failed because it referenced a name that does not
    /// resolve inside the sandbox (variable, function or module).
    pub fn is_name_error(&self) -> bool {
        match self {
            InvokeError::Script(err) => is_unresolved_name(err),
            _ => false,
        }
    }
}

fn is_unresolved_name(err: &EvalAltResult) -> bool {
    match err {
        EvalAltResult::ErrorVariableNotFound(..)
        | EvalAltResult::ErrorFunctionNotFound(..)
        | EvalAltResult::ErrorModuleNotFound(..) => true,
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _)
        | EvalAltResult::ErrorInModule(_, inner, _) => is_unresolved_name(inner),
        _ => false,
    }
}

/// Any failure along the capture → build → invoke path.
#[derive(Debug, Error)]
pub enum CapsuleError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

pub type Result<T> = std::result::Result<T, CapsuleError>;

//! Capturing callables into capsule records.
//!
//! `register_capsule` is the explicit replacement for a capturing
//! annotation: the call site hands over the callable and a
//! [`CaptureConfig`] and gets back an immutable [`CapsuleRecord`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use rhai::{Dynamic, Engine};

use crate::constants::{DEFAULT_GROUP, DEFAULT_MARKER};
use crate::error::CaptureError;
use crate::literal::{Literal, encode_checked};
use crate::normalize::normalize;
use crate::record::{CapsuleRecord, compose_docstring, format_signature};

static FN_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:private\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap()
});
static DOC_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*///\s?(.*)$").unwrap());

/// Signature of a precompiled host function.
pub type NativeFnPtr = fn(&[Dynamic]) -> Dynamic;

/// Something that can be called: either script text or a host function.
///
/// Only scripts carry source that can be captured.
#[derive(Clone, Debug)]
pub enum Callable {
    Script(ScriptFn),
    Native(NativeFn),
}

impl Callable {
    /// A script whose single function is the entry point.
    pub fn script(text: impl Into<String>) -> Self {
        Callable::Script(ScriptFn {
            name: None,
            text: text.into(),
        })
    }

    /// A script that may define several functions; `name` is the entry point.
    pub fn script_named(name: impl Into<String>, text: impl Into<String>) -> Self {
        Callable::Script(ScriptFn {
            name: Some(name.into()),
            text: text.into(),
        })
    }

    pub fn native(name: &'static str, func: NativeFnPtr) -> Self {
        Callable::Native(NativeFn { name, func })
    }
}

#[derive(Clone, Debug)]
pub struct ScriptFn {
    name: Option<String>,
    text: String,
}

impl ScriptFn {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Clone, Copy)]
pub struct NativeFn {
    name: &'static str,
    func: NativeFnPtr,
}

impl NativeFn {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn call(&self, args: &[Dynamic]) -> Dynamic {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").field("name", &self.name).finish()
    }
}

/// Where and how a callable is captured.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Storage name; the function name when `None`.
    pub slot_name: Option<String>,
    pub group: String,
    /// Free text prepended to the function's own doc comments.
    pub description: Option<String>,
    /// First-line prefix identifying the capture marker.
    pub marker: String,
    pub default_args: Vec<Dynamic>,
    pub default_kwargs: Vec<(String, Dynamic)>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            slot_name: None,
            group: DEFAULT_GROUP.to_string(),
            description: None,
            marker: DEFAULT_MARKER.to_string(),
            default_args: Vec::new(),
            default_kwargs: Vec::new(),
        }
    }
}

impl CaptureConfig {
    #[must_use]
    pub fn slot(mut self, name: impl Into<String>) -> Self {
        self.slot_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    #[must_use]
    pub fn marker(mut self, prefix: impl Into<String>) -> Self {
        self.marker = prefix.into();
        self
    }

    /// Append a default positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Dynamic>) -> Self {
        self.default_args.push(value.into());
        self
    }

    /// Set a default keyword argument; a repeated key replaces the earlier value.
    #[must_use]
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Dynamic>) -> Self {
        let key = key.into();
        self.default_kwargs.retain(|(k, _)| *k != key);
        self.default_kwargs.push((key, value.into()));
        self
    }
}

/// Capture `callable` into a record.
///
/// Default values are checked for literal fidelity before anything else.
pub fn register_capsule(
    callable: &Callable,
    config: &CaptureConfig,
) -> Result<CapsuleRecord, CaptureError> {
    let default_args = config
        .default_args
        .iter()
        .enumerate()
        .map(|(i, value)| checked_literal(value, &format!("argument {i}")))
        .collect::<Result<Vec<_>, _>>()?;
    let default_kwargs = config
        .default_kwargs
        .iter()
        .map(|(key, value)| {
            checked_literal(value, &format!("keyword argument `{key}`"))
                .map(|lit| (key.clone(), lit))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let script = match callable {
        Callable::Script(script) => script,
        Callable::Native(native) => {
            return Err(CaptureError::SourceUnavailable(format!(
                "`{}` is a native function and has no retrievable source",
                native.name()
            )));
        }
    };

    let source = normalize(script.text(), &config.marker)?;
    let (function_name, params) = select_function(&source, script.name())?;

    let documentation = doc_comments(&source, &function_name);
    let docstring = compose_docstring(config.description.as_deref(), documentation.as_deref());
    let signature = format_signature(&function_name, &params, &default_kwargs);
    let slot_name = config
        .slot_name
        .clone()
        .unwrap_or_else(|| function_name.clone());

    tracing::debug!(%slot_name, %signature, "captured capsule");

    Ok(CapsuleRecord::new(
        slot_name,
        function_name,
        source,
        docstring,
        signature,
        default_args,
        default_kwargs,
    ))
}

fn checked_literal(value: &Dynamic, what: &str) -> Result<Literal, CaptureError> {
    let literal =
        Literal::from_dynamic(value.clone()).map_err(|reason| CaptureError::NonLiteralValue {
            what: what.to_string(),
            reason,
        })?;
    encode_checked(&literal, what)?;
    Ok(literal)
}

/// Find the entry point and its parameter names.
fn select_function(
    source: &str,
    wanted: Option<&str>,
) -> Result<(String, Vec<String>), CaptureError> {
    let ast = Engine::new_raw()
        .compile(source)
        .map_err(|e| CaptureError::SourceUnavailable(format!("source does not parse: {e}")))?;
    let functions: Vec<(String, Vec<String>)> = ast
        .iter_functions()
        .map(|f| {
            (
                f.name.to_string(),
                f.params.iter().map(|p| p.to_string()).collect(),
            )
        })
        .collect();

    match wanted {
        Some(name) => functions
            .into_iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| {
                CaptureError::SourceUnavailable(format!("source does not define `{name}`"))
            }),
        None => {
            let mut iter = functions.into_iter();
            match (iter.next(), iter.next()) {
                (Some(only), None) => Ok(only),
                (None, _) => Err(CaptureError::SourceUnavailable(
                    "source defines no function".to_string(),
                )),
                (Some(_), Some(_)) => Err(CaptureError::SourceUnavailable(
                    "source defines several functions; name the entry point".to_string(),
                )),
            }
        }
    }
}

/// `///` comment lines directly above `fn <name>(`.
fn doc_comments(source: &str, function_name: &str) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let header = lines.iter().position(|line| {
        FN_HEADER
            .captures(line)
            .is_some_and(|c| &c[1] == function_name)
    })?;

    let mut docs: Vec<&str> = lines[..header]
        .iter()
        .rev()
        .map_while(|line| DOC_LINE.captures(line).and_then(|c| c.get(1)))
        .map(|m| m.as_str().trim_end())
        .collect();
    if docs.is_empty() {
        return None;
    }
    docs.reverse();
    Some(docs.join("\n"))
}

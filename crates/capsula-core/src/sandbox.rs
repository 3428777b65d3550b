//! Rebuilding and invoking capsules in an isolated script engine.
//!
//! A [`Capsule`] owns a private engine and the compiled source of one
//! record. Every call assembles a fresh [`ExecutionContext`] holding the
//! container identity, the function, the resolved positionals and the
//! resolved keywords, and nothing else. Besides its parameters, the function
//! sees exactly those four names (`container`, `function`, `args`, `kwargs`);
//! top-level variables of the source and anything defined by the caller are
//! out of reach, so a reference to any other name fails when the function
//! runs, never when it is built.
//!
//! Binding order for one call:
//! 1. the container identity is the first positional argument;
//! 2. the remaining positionals are the stored defaults (see [`PositionalPolicy`]);
//! 3. keywords are the stored defaults overlaid by call-time keywords and
//!    bind to the remaining parameters by name; a trailing `kwargs`
//!    parameter receives whatever is left as a map.

use std::fmt;

use rhai::module_resolvers::StaticModuleResolver;
use rhai::{
    AST, Array, CallFnOptions, Dynamic, Engine, FnPtr, ImmutableString, Map, Module, Scope,
};

use crate::constants::{
    CONTEXT_ARGS, CONTEXT_CONTAINER, CONTEXT_FUNCTION, CONTEXT_KWARGS, KWARGS_PARAM,
    SCRIPT_LOG_TARGET,
};
use crate::error::{InvokeError, ReconstructionError};
use crate::literal::Literal;
use crate::record::CapsuleRecord;

/// Whether call-time positional arguments may replace the stored ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PositionalPolicy {
    /// Positionals are fixed at capture time; supplying any is an error.
    #[default]
    Locked,
    /// Supplied positionals replace the stored list as a whole.
    Overridable,
}

/// Build-time options for the sandbox.
#[derive(Clone, Debug, Default)]
pub struct SandboxOptions {
    pub positional: PositionalPolicy,
    modules: Vec<(String, Module)>,
}

impl SandboxOptions {
    #[must_use]
    pub fn positional(mut self, policy: PositionalPolicy) -> Self {
        self.positional = policy;
        self
    }

    /// Make `module` importable from capsule scripts as `import "<name>"`.
    ///
    /// Registered modules are only reachable through `import`; they add no
    /// names to the function's scope.
    #[must_use]
    pub fn module(mut self, name: impl Into<String>, module: Module) -> Self {
        self.modules.push((name.into(), module));
        self
    }
}

/// The four bindings available to one invocation.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub container: Dynamic,
    pub function: FnPtr,
    pub args: Array,
    pub kwargs: Map,
}

impl ExecutionContext {
    fn into_scope(self) -> Scope<'static> {
        let mut scope = Scope::new();
        scope
            .push_constant_dynamic(CONTEXT_CONTAINER, self.container)
            .push_constant(CONTEXT_FUNCTION, self.function)
            .push_constant(CONTEXT_ARGS, self.args)
            .push_constant(CONTEXT_KWARGS, self.kwargs);
        scope
    }
}

/// A reconstructed, invocable capsule.
pub struct Capsule {
    engine: Engine,
    ast: AST,
    function: FnPtr,
    params: Vec<String>,
    container: ImmutableString,
    default_args: Array,
    default_kwargs: Map,
    policy: PositionalPolicy,
    record: CapsuleRecord,
}

impl Capsule {
    /// Rebuild `record` with default options.
    pub fn build(
        record: &CapsuleRecord,
        container: impl Into<String>,
    ) -> Result<Self, ReconstructionError> {
        Self::build_with(record, container, &SandboxOptions::default())
    }

    /// Rebuild `record`; `container` is injected as the first argument of every call.
    pub fn build_with(
        record: &CapsuleRecord,
        container: impl Into<String>,
        options: &SandboxOptions,
    ) -> Result<Self, ReconstructionError> {
        let function_name = record.function_name();
        let engine = sandbox_engine(options);

        let ast = engine
            .compile(record.source())
            .map_err(|e| ReconstructionError::Parse {
                function: function_name.to_string(),
                message: e.to_string(),
            })?;

        // Top-level statements run once, in a namespace of their own.
        let mut namespace = Scope::new();
        engine
            .run_ast_with_scope(&mut namespace, &ast)
            .map_err(|source| ReconstructionError::Execution {
                function: function_name.to_string(),
                source,
            })?;

        let params: Vec<String> = ast
            .iter_functions()
            .find(|f| f.name == function_name)
            .map(|f| f.params.iter().map(|p| p.to_string()).collect())
            .ok_or_else(|| ReconstructionError::MissingFunction(function_name.to_string()))?;
        if params.is_empty() {
            return Err(ReconstructionError::NoContainerParameter(
                function_name.to_string(),
            ));
        }

        let function =
            FnPtr::new(function_name).map_err(|source| ReconstructionError::Execution {
                function: function_name.to_string(),
                source,
            })?;

        let container: String = container.into();
        tracing::debug!(function = function_name, %container, ?params, "built capsule");

        Ok(Self {
            engine,
            ast,
            function,
            params,
            container: container.into(),
            default_args: record.default_args().iter().map(Literal::to_dynamic).collect(),
            default_kwargs: record
                .default_kwargs()
                .iter()
                .map(|(k, v)| (k.as_str().into(), v.to_dynamic()))
                .collect(),
            policy: options.positional,
            record: record.clone(),
        })
    }

    pub fn record(&self) -> &CapsuleRecord {
        &self.record
    }

    pub fn container(&self) -> &str {
        self.container.as_str()
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Call with the stored defaults only.
    pub fn call(&self) -> Result<Dynamic, InvokeError> {
        self.invoke(Vec::new(), Map::new())
    }

    /// Call with keyword overrides.
    pub fn call_with<K, V>(
        &self,
        kwargs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Dynamic, InvokeError>
    where
        K: Into<String>,
        V: Into<Dynamic>,
    {
        let kwargs: Map = kwargs
            .into_iter()
            .map(|(k, v)| {
                let key: String = k.into();
                (key.into(), v.into())
            })
            .collect();
        self.invoke(Vec::new(), kwargs)
    }

    /// Call with explicit positionals and keywords.
    ///
    /// Non-empty `positional` fails with [`InvokeError::ArgumentOverride`]
    /// unless the capsule was built with [`PositionalPolicy::Overridable`].
    pub fn invoke(&self, positional: Vec<Dynamic>, kwargs: Map) -> Result<Dynamic, InvokeError> {
        let function_name = self.record.function_name();

        let args = if positional.is_empty() {
            self.default_args.clone()
        } else {
            match self.policy {
                PositionalPolicy::Locked => {
                    return Err(InvokeError::ArgumentOverride {
                        function: function_name.to_string(),
                        supplied: positional.len(),
                    });
                }
                PositionalPolicy::Overridable => positional,
            }
        };

        let mut merged = self.default_kwargs.clone();
        merged.extend(kwargs);

        let context = ExecutionContext {
            container: Dynamic::from(self.container.clone()),
            function: self.function.clone(),
            args,
            kwargs: merged,
        };
        let bound = self.bind(&context)?;
        let mut scope = context.into_scope();

        tracing::debug!(function = function_name, arity = bound.len(), "invoking capsule");
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        self.engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, function_name, bound)
            .map_err(InvokeError::Script)
    }

    /// Lay out the context as the function's argument list.
    fn bind(&self, context: &ExecutionContext) -> Result<Vec<Dynamic>, InvokeError> {
        let function = self.record.function_name();
        let collector = self.params.len() > 1
            && self.params.last().is_some_and(|p| p == KWARGS_PARAM);
        let named_end = if collector {
            self.params.len() - 1
        } else {
            self.params.len()
        };

        let mut bound = Vec::with_capacity(self.params.len());
        bound.push(context.container.clone());
        bound.extend(context.args.iter().cloned());
        if bound.len() > named_end {
            return Err(InvokeError::TooManyPositional {
                function: function.to_string(),
                accepted: named_end - 1,
                given: context.args.len(),
            });
        }

        let mut remaining = context.kwargs.clone();
        if let Some(taken) = self.params[..bound.len()]
            .iter()
            .find(|p| remaining.contains_key(p.as_str()))
        {
            return Err(InvokeError::DuplicateArgument {
                function: function.to_string(),
                parameter: taken.clone(),
            });
        }

        for param in &self.params[bound.len()..named_end] {
            let value =
                remaining
                    .remove(param.as_str())
                    .ok_or_else(|| InvokeError::MissingArgument {
                        function: function.to_string(),
                        parameter: param.clone(),
                    })?;
            bound.push(value);
        }

        if collector {
            bound.push(Dynamic::from_map(remaining));
        } else if !remaining.is_empty() {
            return Err(InvokeError::UnexpectedKeyword {
                function: function.to_string(),
                names: remaining.keys().map(|k| k.to_string()).collect(),
            });
        }
        Ok(bound)
    }
}

impl fmt::Debug for Capsule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capsule")
            .field("function", &self.record.function_name())
            .field("container", &self.container)
            .field("params", &self.params)
            .field("policy", &self.policy)
            .finish()
    }
}

/// An engine with the language built-ins, the registered modules behind
/// `import`, and script output routed to tracing.
fn sandbox_engine(options: &SandboxOptions) -> Engine {
    let mut engine = Engine::new();

    let mut resolver = StaticModuleResolver::new();
    for (name, module) in &options.modules {
        resolver.insert(name.as_str(), module.clone());
    }
    engine.set_module_resolver(resolver);

    engine.on_print(|text| tracing::info!(target: SCRIPT_LOG_TARGET, "{text}"));
    engine.on_debug(|text, source, pos| {
        tracing::debug!(target: SCRIPT_LOG_TARGET, source = source.unwrap_or_default(), %pos, "{text}")
    });
    engine
}

use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{DESCRIPTION_SECTION, DOCUMENTATION_SECTION, KWARGS_PARAM};
use crate::literal::Literal;

/// The unit of persistence: a function's normalized source plus the
/// metadata needed to call it again.
///
/// Records are immutable. Building a capsule from one never changes it.
#[derive(Clone, Debug, PartialEq)]
pub struct CapsuleRecord {
    slot_name: String,
    function_name: String,
    source: String,
    docstring: String,
    signature: String,
    default_args: Vec<Literal>,
    default_kwargs: BTreeMap<String, Literal>,
}

impl CapsuleRecord {
    pub fn new(
        slot_name: impl Into<String>,
        function_name: impl Into<String>,
        source: impl Into<String>,
        docstring: impl Into<String>,
        signature: impl Into<String>,
        default_args: Vec<Literal>,
        default_kwargs: BTreeMap<String, Literal>,
    ) -> Self {
        Self {
            slot_name: slot_name.into(),
            function_name: function_name.into(),
            source: source.into(),
            docstring: docstring.into(),
            signature: signature.into(),
            default_args,
            default_kwargs,
        }
    }

    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn docstring(&self) -> &str {
        &self.docstring
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn default_args(&self) -> &[Literal] {
        &self.default_args
    }

    pub fn default_kwargs(&self) -> &BTreeMap<String, Literal> {
        &self.default_kwargs
    }

    /// Copy of this record stored under a different slot.
    pub fn with_slot_name(&self, slot_name: impl Into<String>) -> Self {
        Self {
            slot_name: slot_name.into(),
            ..self.clone()
        }
    }
}

/// Listing form: the signature followed by the indented docstring.
impl fmt::Display for CapsuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.slot_name, self.signature)?;
        for line in self.docstring.lines() {
            write!(f, "\n    {line}")?;
        }
        Ok(())
    }
}

/// Render a parameter list such as `plot(container, title, xlabel = "xlabel", ..kwargs)`.
///
/// Parameters with a stored keyword default show it; a trailing collector
/// parameter is marked with `..`.
pub fn format_signature(
    function_name: &str,
    params: &[String],
    default_kwargs: &BTreeMap<String, Literal>,
) -> String {
    let rendered: Vec<String> = params
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if i + 1 == params.len() && i > 0 && name == KWARGS_PARAM {
                format!("..{name}")
            } else if let Some(value) = default_kwargs.get(name) {
                format!("{name} = {value}")
            } else {
                name.clone()
            }
        })
        .collect();
    format!("{function_name}({})", rendered.join(", "))
}

/// Join an external description and the function's own documentation.
///
/// With only one part present it is returned as is; with both, each part
/// is introduced by its section header.
pub fn compose_docstring(description: Option<&str>, documentation: Option<&str>) -> String {
    let description = description.map(str::trim).filter(|s| !s.is_empty());
    let documentation = documentation.map(str::trim).filter(|s| !s.is_empty());
    match (description, documentation) {
        (Some(d), Some(doc)) => {
            format!("{DESCRIPTION_SECTION}\n{d}\n\n{DOCUMENTATION_SECTION}\n{doc}")
        }
        (Some(d), None) => d.to_string(),
        (None, Some(doc)) => doc.to_string(),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_signature_with_defaults() {
        let kwargs = BTreeMap::from([("xlabel".to_string(), Literal::from("xlabel"))]);
        let sig = format_signature("plot", &params(&["container", "title", "xlabel"]), &kwargs);
        assert_eq!(sig, r#"plot(container, title, xlabel = "xlabel")"#);
    }

    #[test]
    fn test_signature_marks_collector() {
        let sig = format_signature("foo", &params(&["container", "kwargs"]), &BTreeMap::new());
        assert_eq!(sig, "foo(container, ..kwargs)");
    }

    #[test]
    fn test_docstring_sections() {
        assert_eq!(compose_docstring(None, None), "");
        assert_eq!(compose_docstring(Some("  plots x  "), None), "plots x");
        assert_eq!(compose_docstring(None, Some("Plots.")), "Plots.");
        let both = compose_docstring(Some("Example data plot"), Some("Plots y over x."));
        assert_eq!(
            both,
            "== description ==\nExample data plot\n\n== documentation ==\nPlots y over x."
        );
    }

    #[test]
    fn test_display_indents_docstring() {
        let record = CapsuleRecord::new(
            "plot",
            "plot",
            "fn plot(c) {}",
            "line one\nline two",
            "plot(c)",
            Vec::new(),
            BTreeMap::new(),
        );
        assert_eq!(record.to_string(), "plot: plot(c)\n    line one\n    line two");
    }

    #[test]
    fn test_with_slot_name_keeps_content() {
        let record = CapsuleRecord::new(
            "plot",
            "plot",
            "fn plot(c) {}",
            "",
            "plot(c)",
            vec![Literal::Int(1)],
            BTreeMap::new(),
        );
        let moved = record.with_slot_name("plot_v2");
        assert_eq!(moved.slot_name(), "plot_v2");
        assert_eq!(moved.source(), record.source());
        assert_eq!(moved.default_args(), record.default_args());
    }
}

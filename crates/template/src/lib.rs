//! Rendering of `[[ .variable ]]` placeholder bodies.
//!
//! Bodies are plain text scanned left to right. `[[` opens a placeholder,
//! which holds exactly one `.name` reference and closes with `]]`. All
//! other text passes through untouched, notably `{{ ... }}` actions that
//! are evaluated much later by the notification daemon.

use models::{RuleVariable, VariableSpec};
use std::collections::BTreeMap;

#[must_use]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("variable {name} is bound to conflicting values {lhs:?} and {rhs:?}")]
    AmbiguousOverride {
        name: String,
        lhs: String,
        rhs: String,
    },
    #[error("body references variable {name}, which the template doesn't declare")]
    UnboundVariable { name: String },
    #[error("malformed placeholder at byte {offset}: expected `[[ .variable ]]`")]
    MalformedPlaceholder { offset: usize },
    #[error("placeholder opened at byte {offset} is never closed with `]]`")]
    UnterminatedPlaceholder { offset: usize },
}

/// Merge variable overrides atop the declared defaults of `specs`,
/// producing effective bindings for rendering. Overrides of variables
/// which no spec declares are ignored. An override given twice must bind
/// the same value both times.
pub fn merge(
    specs: &[VariableSpec],
    overrides: &[RuleVariable],
) -> Result<BTreeMap<String, String>, Error> {
    let mut given: BTreeMap<&str, &str> = BTreeMap::new();

    for var in overrides {
        if let Some(&prior) = given.get(var.name.as_str()) {
            if prior != var.value {
                return Err(Error::AmbiguousOverride {
                    name: var.name.clone(),
                    lhs: prior.to_string(),
                    rhs: var.value.clone(),
                });
            }
        }
        given.insert(&var.name, &var.value);
    }

    Ok(specs
        .iter()
        .map(|spec| {
            let value = given
                .get(spec.name.as_str())
                .copied()
                .unwrap_or(&spec.default);
            (spec.name.clone(), value.to_string())
        })
        .collect())
}

/// The full variable list persisted with a rule: one binding per declared
/// spec, in declaration order, with overrides applied.
pub fn normalized_variables(
    specs: &[VariableSpec],
    overrides: &[RuleVariable],
) -> Result<Vec<RuleVariable>, Error> {
    let merged = merge(specs, overrides)?;

    Ok(specs
        .iter()
        .map(|spec| RuleVariable {
            name: spec.name.clone(),
            value: merged[&spec.name].clone(),
        })
        .collect())
}

/// Render `body`, substituting every `[[ .name ]]` placeholder with its
/// binding from `vars`. Rendering is pure text substitution: values are
/// spliced verbatim and the output is not re-scanned.
pub fn render(body: &str, vars: &BTreeMap<String, String>) -> Result<String, Error> {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(open) = rest.find("[[") {
        let offset = body.len() - rest.len() + open;
        out.push_str(&rest[..open]);

        let inner = &rest[open + 2..];
        let Some(close) = inner.find("]]") else {
            return Err(Error::UnterminatedPlaceholder { offset });
        };

        let name = match inner[..close].trim().strip_prefix('.') {
            Some(name) if is_variable_name(name) => name,
            _ => return Err(Error::MalformedPlaceholder { offset }),
        };
        let Some(value) = vars.get(name) else {
            return Err(Error::UnboundVariable {
                name: name.to_string(),
            });
        };
        out.push_str(value);

        rest = &inner[close + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Check that `body` renders cleanly when every declared variable takes
/// its default. Run before a template is accepted into the store, so that
/// unbound or malformed placeholders surface at write time rather than
/// when a rule first instantiates the template.
pub fn validate_body(body: &str, specs: &[VariableSpec]) -> Result<(), Error> {
    let defaults = merge(specs, &[])?;
    render(body, &defaults).map(|_| ())
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

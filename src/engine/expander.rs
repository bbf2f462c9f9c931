//! Component Expander
//!
//! Inlines `uses: <component>` references before execution and registers
//! every operation id into the handler map. The referencing operation's id is
//! preserved: either the final inlined operation takes it over, or a copy
//! step is appended that republishes the final output under that id.

use std::collections::HashMap;
use tracing::debug;

use crate::errors::{RecipeError, Result};
use crate::recipe::{ComponentRegistry, Operation};

/// Nesting limit for component references
pub const MAX_EXPANSION_DEPTH: usize = 50;

/// Expand every component reference in `ops`, registering ids into `op_map`.
pub fn expand(
    ops: &[Operation],
    registry: &ComponentRegistry,
    op_map: &mut HashMap<String, Operation>,
) -> Result<Vec<Operation>> {
    let expanded = expand_list(ops, registry, 0)?;
    register(&expanded, op_map);
    Ok(expanded)
}

fn expand_list(
    ops: &[Operation],
    registry: &ComponentRegistry,
    depth: usize,
) -> Result<Vec<Operation>> {
    if depth > MAX_EXPANSION_DEPTH {
        return Err(RecipeError::RecursionLimit {
            limit: MAX_EXPANSION_DEPTH,
        });
    }

    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        if op.uses.is_empty() {
            let mut op = op.clone();
            if !op.operations.is_empty() {
                op.operations = expand_list(&op.operations, registry, depth + 1)?;
            }
            out.push(op);
        } else {
            out.extend(inline(op, registry, depth)?);
        }
    }
    Ok(out)
}

fn inline(op: &Operation, registry: &ComponentRegistry, depth: usize) -> Result<Vec<Operation>> {
    let component = registry
        .get(&op.uses)
        .ok_or_else(|| RecipeError::ComponentNotFound(op.uses.clone()))?;
    debug!(component = %component.id, op = %op.label(), "inlining component");

    let mut roots = component.operations.clone();
    for root in &mut roots {
        root.condition = conjoin(&op.condition, &root.condition);
        root.silent |= op.silent;
    }

    let mut expanded = expand_list(&roots, registry, depth + 1)?;
    let Some(last) = expanded.last_mut() else {
        return Ok(expanded);
    };

    // on_failure belongs to the step that can fail; the copy step only
    // routes success.
    if !op.on_failure.is_empty() {
        last.on_failure = op.on_failure.clone();
    }

    if !op.id.is_empty() && !last.id.is_empty() && last.id != op.id {
        let copy = Operation {
            name: op.name.clone(),
            id: op.id.clone(),
            condition: op.condition.clone(),
            silent: true,
            copy_from: Some(last.id.clone()),
            ..Default::default()
        };
        expanded.push(copy);
    } else if !op.id.is_empty() {
        last.id = op.id.clone();
    }

    if let Some(last) = expanded.last_mut() {
        last.break_loop |= op.break_loop;
        last.exit |= op.exit;
        if !op.on_success.is_empty() {
            last.on_success = op.on_success.clone();
        }
    }
    Ok(expanded)
}

fn conjoin(outer: &str, inner: &str) -> String {
    match (outer.trim(), inner.trim()) {
        ("", inner) => inner.to_string(),
        (outer, "") => outer.to_string(),
        (outer, inner) => format!("({}) && ({})", outer, inner),
    }
}

fn register(ops: &[Operation], op_map: &mut HashMap<String, Operation>) {
    for op in ops {
        if !op.id.is_empty() {
            op_map.insert(op.id.clone(), op.clone());
        }
        register(&op.operations, op_map);
    }
}

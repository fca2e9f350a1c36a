//! Dependency resolution and load ordering

use crate::error::{ExtensionError, PluginRef, Result};
use crate::spec::{PluginSpec, PluginState};
use std::collections::HashMap;
use tracing::{debug, info};

/// Resolve every `Read` record and compute the load order
///
/// Records whose dependencies cannot be satisfied, that sit on a cycle,
/// or that depend on such a record are frozen at `Read`. Everything else
/// becomes `Resolved`. The returned queue lists every resolved record after
/// all of its dependencies.
pub(crate) fn resolve(specs: &mut [PluginSpec]) -> Vec<usize> {
    let names = name_index(specs);

    for index in 0..specs.len() {
        let spec = &specs[index];
        if spec.state() != PluginState::Read || spec.has_error() {
            continue;
        }
        if let Err(err) = resolve_dependencies(specs, index, &names) {
            specs[index].fail(err);
        }
    }

    let queue = load_queue(specs);

    for &index in &queue {
        if specs[index].state() == PluginState::Read {
            specs[index].advance(PluginState::Resolved);
            debug!(plugin = %specs[index].name(), "Plugin resolved");
        }
    }
    info!(count = queue.len(), "Resolved plugin load order");
    queue
}

fn name_index(specs: &[PluginSpec]) -> HashMap<String, usize> {
    specs
        .iter()
        .enumerate()
        .filter(|(_, spec)| spec.state() != PluginState::Invalid)
        .map(|(index, spec)| (spec.name().to_string(), index))
        .collect()
}

/// Map each declared dependency of `index` to the record providing it
pub(crate) fn resolve_dependencies(
    specs: &mut [PluginSpec],
    index: usize,
    names: &HashMap<String, usize>,
) -> Result<()> {
    specs[index].expect_state(PluginState::Read, "Resolving dependencies failed")?;

    let Some(manifest) = specs[index].manifest() else {
        return Err(ExtensionError::state_precondition(
            "Resolving dependencies failed because manifest is missing",
        ));
    };

    let mut resolved = Vec::with_capacity(manifest.dependencies.len());
    for dep in &manifest.dependencies {
        match names.get(dep.name.as_str()) {
            Some(&found) if specs[found].provides(&dep.name, &dep.version) => {
                resolved.push(found)
            }
            _ => return Err(ExtensionError::unresolved(&dep.name, &dep.version)),
        }
    }

    specs[index].set_dependency_specs(resolved);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done(bool),
}

/// Depth-first topological sort over the dependency edges
///
/// Freezes cycle members and dependents of frozen records as a side effect.
fn load_queue(specs: &mut [PluginSpec]) -> Vec<usize> {
    let mut marks = vec![Mark::Unvisited; specs.len()];
    let mut queue = Vec::new();
    let mut stack = Vec::new();

    for index in 0..specs.len() {
        if specs[index].state() == PluginState::Invalid {
            continue;
        }
        if marks[index] == Mark::Unvisited {
            visit(specs, index, &mut marks, &mut stack, &mut queue);
        }
    }
    queue
}

fn visit(
    specs: &mut [PluginSpec],
    index: usize,
    marks: &mut [Mark],
    stack: &mut Vec<usize>,
    queue: &mut Vec<usize>,
) -> bool {
    marks[index] = Mark::OnStack;
    stack.push(index);

    let mut ok = !specs[index].has_error();
    if ok {
        for dep in specs[index].dependency_specs().to_vec() {
            let dep_ok = match marks[dep] {
                Mark::Unvisited => visit(specs, dep, marks, stack, queue),
                Mark::Done(dep_ok) => dep_ok,
                Mark::OnStack => {
                    report_cycle(specs, stack, dep);
                    false
                }
            };
            if !dep_ok {
                if !specs[index].has_error() {
                    let failed = &specs[dep];
                    let err = ExtensionError::dependency_failed(
                        failed.name(),
                        failed.version(),
                        failed.failure_reason(),
                    );
                    specs[index].fail(err);
                }
                ok = false;
                break;
            }
        }
    }

    stack.pop();
    marks[index] = Mark::Done(ok);
    if ok {
        queue.push(index);
    }
    ok
}

/// Freeze every record on the stack suffix starting at `start`
fn report_cycle(specs: &mut [PluginSpec], stack: &[usize], start: usize) {
    let Some(pos) = stack.iter().position(|&i| i == start) else {
        return;
    };
    let members = &stack[pos..];
    let chain: Vec<PluginRef> = members
        .iter()
        .chain(std::iter::once(&start))
        .map(|&i| PluginRef::new(specs[i].name(), specs[i].version()))
        .collect();

    for &member in members {
        if !specs[member].has_error() {
            specs[member].fail(ExtensionError::CircularDependency {
                chain: chain.clone(),
            });
        }
    }
}

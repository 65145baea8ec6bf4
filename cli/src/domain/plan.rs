//! Dependency sequencing: apply waves, unresolvable modules, cycle detection.
//!
//! Pure functions only — no I/O, no async.

use std::collections::{HashMap, HashSet};

use stackcheck_common::{PlanOutput, SkippedModule};

use crate::domain::error::PlanError;
use crate::domain::module::ModuleDescriptor;

/// Apply order for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Each wave only depends on modules in earlier waves. Within a wave,
    /// modules keep suite declaration order.
    pub waves: Vec<Vec<String>>,
    /// Modules that will never be applied, with the prerequisites that are
    /// unavailable to them.
    pub skipped: Vec<PlannedSkip>,
}

/// A module whose prerequisites are not part of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSkip {
    pub module: String,
    pub missing: Vec<String>,
}

impl Plan {
    #[must_use]
    pub fn to_output(&self) -> PlanOutput {
        PlanOutput {
            waves: self.waves.clone(),
            skipped: self
                .skipped
                .iter()
                .map(|s| SkippedModule {
                    module: s.module.clone(),
                    missing: s.missing.clone(),
                })
                .collect(),
        }
    }
}

/// Build the apply plan for `modules`, restricted to `only` when non-empty.
///
/// Structural checks (duplicates, undeclared input sources, cycles) run over
/// the whole suite so a broken suite fails regardless of the selection.
/// A selected module whose prerequisite is outside the selection, or is
/// itself skipped, is reported in `Plan::skipped` and never scheduled.
///
/// # Errors
///
/// Returns `PlanError` for duplicate ids, unknown ids in `only`, an
/// `inputs_from` source missing from `requires`, or a dependency cycle.
pub fn plan(modules: &[ModuleDescriptor], only: &[String]) -> Result<Plan, PlanError> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, m) in modules.iter().enumerate() {
        if index.insert(m.id.as_str(), i).is_some() {
            return Err(PlanError::DuplicateModule(m.id.clone()));
        }
    }

    for m in modules {
        for (var, source) in &m.inputs_from {
            if !m.requires.contains(&source.module) {
                return Err(PlanError::UndeclaredInputSource {
                    module: m.id.clone(),
                    var: var.clone(),
                    source_module: source.module.clone(),
                });
            }
        }
    }

    if let Some(cycle) = find_cycle(modules, &index) {
        return Err(PlanError::DependencyCycle { cycle });
    }

    let selected: HashSet<&str> = if only.is_empty() {
        index.keys().copied().collect()
    } else {
        let mut set = HashSet::new();
        for id in only {
            if !index.contains_key(id.as_str()) {
                return Err(PlanError::UnknownModule(id.clone()));
            }
            set.insert(id.as_str());
        }
        set
    };

    // Depth of each schedulable module; `None` marks a skipped one. The graph
    // is acyclic here, so resolving in topological order always terminates.
    let mut depth: HashMap<&str, Option<usize>> = HashMap::new();
    let mut skipped = Vec::new();
    for id in topological_order(modules, &index) {
        if !selected.contains(id) {
            continue;
        }
        let module = &modules[index[id]];
        let missing: Vec<String> = module
            .requires
            .iter()
            .filter(|req| !matches!(depth.get(req.as_str()), Some(Some(_))))
            .cloned()
            .collect();
        if missing.is_empty() {
            let d = module
                .requires
                .iter()
                .filter_map(|req| depth.get(req.as_str()).copied().flatten())
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(id, Some(d));
        } else {
            depth.insert(id, None);
            skipped.push((index[id], missing));
        }
    }

    let wave_count = depth.values().flatten().map(|d| d + 1).max().unwrap_or(0);
    let mut waves = vec![Vec::new(); wave_count];
    for m in modules {
        if let Some(Some(d)) = depth.get(m.id.as_str()) {
            waves[*d].push(m.id.clone());
        }
    }

    skipped.sort_by_key(|(i, _)| *i);
    Ok(Plan {
        waves,
        skipped: skipped
            .into_iter()
            .map(|(i, missing)| PlannedSkip {
                module: modules[i].id.clone(),
                missing,
            })
            .collect(),
    })
}

/// Topological order over declared modules; requirements that name
/// undeclared modules are ignored here (they surface as skips).
fn topological_order<'a>(
    modules: &'a [ModuleDescriptor],
    index: &HashMap<&str, usize>,
) -> Vec<&'a str> {
    let mut order = Vec::with_capacity(modules.len());
    let mut done: HashSet<&str> = HashSet::new();
    while order.len() < modules.len() {
        let before = order.len();
        for m in modules {
            if done.contains(m.id.as_str()) {
                continue;
            }
            let ready = m
                .requires
                .iter()
                .all(|r| !index.contains_key(r.as_str()) || done.contains(r.as_str()));
            if ready {
                done.insert(m.id.as_str());
                order.push(m.id.as_str());
            }
        }
        if order.len() == before {
            break;
        }
    }
    order
}

fn find_cycle(modules: &[ModuleDescriptor], index: &HashMap<&str, usize>) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        i: usize,
        modules: &[ModuleDescriptor],
        index: &HashMap<&str, usize>,
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        marks[i] = Mark::InProgress;
        stack.push(i);
        for req in &modules[i].requires {
            let Some(&j) = index.get(req.as_str()) else {
                continue;
            };
            match marks[j] {
                Mark::InProgress => {
                    let start = stack.iter().position(|&k| k == j).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|&k| modules[k].id.clone()).collect();
                    cycle.push(modules[j].id.clone());
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = visit(j, modules, index, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[i] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::Unvisited; modules.len()];
    let mut stack = Vec::new();
    for i in 0..modules.len() {
        if marks[i] == Mark::Unvisited {
            if let Some(cycle) = visit(i, modules, index, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

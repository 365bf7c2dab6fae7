//! Topological sort of resolved packages using depth-first search (DFS)
//!
//! Dependencies come before their dependents. Three-color marking detects
//! cycles:
//!
//! 1. **WHITE** (unvisited)
//! 2. **GRAY** (on the current DFS path)
//! 3. **BLACK** (fully processed)
//!
//! Reaching a GRAY node means the path from that node back to itself is a
//! cycle; it is reported as `a -> b -> a`.

use std::collections::{BTreeMap, HashSet};

use crate::error::Result;
use crate::error::resolve::circular;

struct SortState<'a> {
    edges: &'a BTreeMap<String, Vec<String>>,
    visited: HashSet<String>,
    path: Vec<String>,
    result: Vec<String>,
}

/// Order `roots` and everything reachable from them, dependencies first
///
/// `edges` maps each package id to the ids it depends on. Ids without an
/// entry are leaves.
pub fn topological_sort(edges: &BTreeMap<String, Vec<String>>, roots: &[String]) -> Result<Vec<String>> {
    let mut state = SortState {
        edges,
        visited: HashSet::new(),
        path: Vec::new(),
        result: Vec::new(),
    };

    for root in roots {
        visit(&mut state, root)?;
    }
    // Anything not reachable from a root, in id order
    for id in edges.keys() {
        visit(&mut state, id)?;
    }
    Ok(state.result)
}

fn visit(state: &mut SortState<'_>, id: &str) -> Result<()> {
    if let Some(start) = state.path.iter().position(|p| p == id) {
        let mut cycle: Vec<String> = state.path[start..].to_vec();
        cycle.push(id.to_string());
        return Err(circular(&cycle));
    }
    if state.visited.contains(id) {
        return Ok(());
    }

    state.path.push(id.to_string());
    if let Some(deps) = state.edges.get(id) {
        for dep in deps {
            visit(state, dep)?;
        }
    }
    state.path.pop();

    state.visited.insert(id.to_string());
    state.result.push(id.to_string());
    Ok(())
}

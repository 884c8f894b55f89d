//! FILENAME: core/engine/src/dependency_graph.rs
//! PURPOSE: Directed graph of references between calculated fields.
//! CONTEXT: Used by form analysis to tell form authors which calculated
//! fields depend on which, whether the references form a cycle, and which
//! order would resolve every reference. It never drives evaluation: a form
//! pass always runs calculated fields in form order.
//!
//! TERMINOLOGY:
//! - Precedents: fields a calculation references (its inputs).
//!   If total = price * qty, then price and qty are precedents of total.
//! - Dependents: fields whose calculation references a given field.
//!   If total = price * qty, then total is a dependent of price and qty.

use std::collections::{BTreeSet, HashMap, HashSet};

/// A reference cycle among fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleError {
    /// The fields involved, in reference order. The first field is repeated
    /// at the end when the exact path could be traced.
    pub cycle_path: Vec<String>,
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Circular reference detected: {}", self.cycle_path.join(" -> "))
    }
}

impl std::error::Error for CycleError {}

/// Precedent and dependent mappings between field keys.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// For each field, the fields it directly references.
    precedents: HashMap<String, BTreeSet<String>>,

    /// For each field, the fields that directly reference it.
    dependents: HashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the precedents of `field`, replacing any previous ones.
    /// Cycles are allowed here and reported by `find_cycles`.
    pub fn set_dependencies(&mut self, field: &str, new_precedents: BTreeSet<String>) {
        self.clear_dependencies(field);

        if new_precedents.is_empty() {
            return;
        }

        for prec in &new_precedents {
            self.dependents
                .entry(prec.clone())
                .or_default()
                .insert(field.to_string());
        }
        self.precedents.insert(field.to_string(), new_precedents);
    }

    fn clear_dependencies(&mut self, field: &str) {
        let Some(old_precs) = self.precedents.remove(field) else {
            return;
        };

        for prec in old_precs {
            if let Some(deps) = self.dependents.get_mut(&prec) {
                deps.remove(field);
                if deps.is_empty() {
                    self.dependents.remove(&prec);
                }
            }
        }
    }

    /// Orders `nodes` so every node comes after its precedents within the
    /// set (Kahn's algorithm). Among ready nodes the one listed first in
    /// `nodes` wins, so an already valid order is returned unchanged.
    pub fn topological_sort(&self, nodes: &[String]) -> Result<Vec<String>, CycleError> {
        let members: HashSet<&str> = nodes.iter().map(String::as_str).collect();

        let mut in_degree: HashMap<&str, usize> = nodes
            .iter()
            .map(|node| {
                let count = self
                    .precedents
                    .get(node)
                    .map_or(0, |precs| precs.iter().filter(|p| members.contains(p.as_str())).count());
                (node.as_str(), count)
            })
            .collect();

        let mut result = Vec::with_capacity(nodes.len());
        let mut done: HashSet<&str> = HashSet::new();

        loop {
            let ready = nodes
                .iter()
                .map(String::as_str)
                .find(|n| !done.contains(n) && in_degree.get(n) == Some(&0));
            let Some(next) = ready else {
                break;
            };

            done.insert(next);
            result.push(next.to_string());

            if let Some(deps) = self.dependents.get(next) {
                for dep in deps {
                    if let Some(deg) = in_degree.get_mut(dep.as_str()) {
                        *deg = deg.saturating_sub(1);
                    }
                }
            }
        }

        if result.len() != members.len() {
            let remaining: Vec<&str> = nodes
                .iter()
                .map(String::as_str)
                .filter(|n| !done.contains(n))
                .collect();
            return Err(CycleError {
                cycle_path: self.find_cycle_path(&remaining),
            });
        }

        Ok(result)
    }

    /// Every distinct cycle among `nodes`, each reported once.
    pub fn find_cycles(&self, nodes: &[String]) -> Vec<CycleError> {
        let mut cycles = Vec::new();
        let mut reported: HashSet<String> = HashSet::new();
        let mut remaining: Vec<String> = nodes.to_vec();

        while let Err(cycle) = self.topological_sort(&remaining) {
            let fresh = cycle.cycle_path.iter().any(|f| !reported.contains(f));
            reported.extend(cycle.cycle_path.iter().cloned());
            if fresh {
                cycles.push(cycle);
            }

            // Drop the traced fields and look again among the rest
            let before = remaining.len();
            remaining.retain(|n| !reported.contains(n));
            if remaining.len() == before {
                break;
            }
        }

        cycles
    }

    /// Traces a cycle through the unresolved nodes by following precedents.
    /// Falls back to listing the unresolved nodes.
    fn find_cycle_path(&self, unresolved: &[&str]) -> Vec<String> {
        let Some(&start) = unresolved.first() else {
            return Vec::new();
        };

        let pending: HashSet<&str> = unresolved.iter().copied().collect();
        let mut path: Vec<&str> = vec![start];
        let mut current = start;

        for _ in 0..=unresolved.len() {
            let next = self
                .precedents
                .get(current)
                .and_then(|precs| precs.iter().map(String::as_str).find(|p| pending.contains(p)));

            let Some(next) = next else {
                break;
            };

            if let Some(pos) = path.iter().position(|p| *p == next) {
                // Trim any lead-in so the path is exactly the loop
                let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
                cycle.push(next.to_string());
                return cycle;
            }

            path.push(next);
            current = next;
        }

        unresolved.iter().map(|s| s.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn list(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_replacing_dependencies_drops_old_edges() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies("a", set_of(&["b"]));
        graph.set_dependencies("b", BTreeSet::new());
        assert_eq!(graph.topological_sort(&list(&["a", "b"])).unwrap(), list(&["b", "a"]));

        graph.set_dependencies("a", BTreeSet::new());
        assert_eq!(graph.topological_sort(&list(&["a", "b"])).unwrap(), list(&["a", "b"]));
    }

    #[test]
    fn test_replacing_dependencies_can_break_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies("a", set_of(&["b"]));
        graph.set_dependencies("b", set_of(&["a"]));
        assert_eq!(graph.find_cycles(&list(&["a", "b"])).len(), 1);

        graph.set_dependencies("b", set_of(&["price"]));
        assert!(graph.find_cycles(&list(&["a", "b"])).is_empty());
    }

    #[test]
    fn test_topological_sort_keeps_valid_order() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies("total", set_of(&["price", "qty"]));
        graph.set_dependencies("tax", set_of(&["total"]));

        let order = graph.topological_sort(&list(&["total", "tax"])).unwrap();
        assert_eq!(order, list(&["total", "tax"]));
    }

    #[test]
    fn test_topological_sort_reorders_forward_references() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies("tax", set_of(&["total"]));
        graph.set_dependencies("total", set_of(&["price"]));

        let order = graph.topological_sort(&list(&["tax", "total"])).unwrap();
        assert_eq!(order, list(&["total", "tax"]));
    }

    #[test]
    fn test_topological_sort_reports_cycle_path() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies("a", set_of(&["b"]));
        graph.set_dependencies("b", set_of(&["a"]));
        graph.set_dependencies("c", set_of(&["x"]));

        let err = graph.topological_sort(&list(&["c", "a", "b"])).unwrap_err();
        assert_eq!(err.cycle_path, list(&["a", "b", "a"]));
        assert_eq!(err.to_string(), "Circular reference detected: a -> b -> a");
    }

    #[test]
    fn test_find_cycles_reports_each_loop_once() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies("a", set_of(&["b"]));
        graph.set_dependencies("b", set_of(&["a"]));
        graph.set_dependencies("self_ref", set_of(&["self_ref"]));
        graph.set_dependencies("ok", set_of(&["price"]));

        let cycles = graph.find_cycles(&list(&["a", "b", "self_ref", "ok"]));
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].cycle_path, list(&["a", "b", "a"]));
        assert_eq!(cycles[1].cycle_path, list(&["self_ref", "self_ref"]));
    }
}

//! cycle validation and deployment ordering
//!
//! Two passes over a frozen [Composition]:
//!
//! 1. depth-first traversal with per-node visitation state. Meeting an
//!    in-progress node again means the graph loops; the error carries the
//!    ordered ids forming the loop so the unresolvable reference can be
//!    diagnosed.
//! 2. Kahn's algorithm with the ready set ordered by declaration index.
//!    Ties between independent nodes break by declaration order, so the
//!    emitted order is reproducible across runs - synthesized templates get
//!    diffed between deployments.
use crate::graph::{Composition, SynthError};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Compute the deployment order
///
/// Requires [Composition::validate] to have passed; an edge to an undeclared
/// id still surfaces as [SynthError::UnresolvedReference] rather than a
/// panic.
pub fn schedule(composition: &Composition) -> Result<Vec<String>, SynthError> {
    detect_cycles(composition)?;

    let index_of: std::collections::HashMap<&str, usize> = composition
        .nodes()
        .enumerate()
        .map(|(index, node)| (node.id(), index))
        .collect();

    let nodes: Vec<_> = composition.nodes().collect();
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; nodes.len()];
    let mut blocked_by: Vec<usize> = vec![0; nodes.len()];

    for (index, node) in nodes.iter().enumerate() {
        for dependency in node.dependencies() {
            let Some(&dependency_index) = index_of.get(dependency) else {
                return Err(SynthError::UnresolvedReference {
                    node: node.id().to_string(),
                    missing: dependency.to_string(),
                });
            };

            dependents[dependency_index].push(index);
            blocked_by[index] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = blocked_by
        .iter()
        .enumerate()
        .filter(|(_, &blockers)| blockers == 0)
        .map(|(index, _)| Reverse(index))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(index)) = ready.pop() {
        order.push(nodes[index].id().to_string());

        for &dependent in &dependents[index] {
            blocked_by[dependent] -= 1;
            if blocked_by[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    // detect_cycles already rejected loops, so every node scheduled
    debug_assert_eq!(order.len(), nodes.len());
    tracing::debug!(?order, "deployment order");
    Ok(order)
}

fn detect_cycles(composition: &Composition) -> Result<(), SynthError> {
    let mut marks: indexmap::IndexMap<&str, Mark> = composition
        .nodes()
        .map(|node| (node.id(), Mark::Unvisited))
        .collect();

    let mut path = vec![];
    for node in composition.nodes() {
        visit(node.id(), composition, &mut marks, &mut path)?;
    }

    Ok(())
}

fn visit<'c>(
    id: &'c str,
    composition: &'c Composition,
    marks: &mut indexmap::IndexMap<&'c str, Mark>,
    path: &mut Vec<&'c str>,
) -> Result<(), SynthError> {
    match marks.get(id).copied() {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            let start = path
                .iter()
                .position(|visited| *visited == id)
                .expect("in-progress node must be on the path");
            return Err(SynthError::CyclicDependency {
                path: path[start..].iter().map(|id| id.to_string()).collect(),
            });
        }
        Some(Mark::Unvisited) => {}
        None => {
            // undeclared target; schedule() reports it with its referrer
            return Ok(());
        }
    }

    marks.insert(id, Mark::InProgress);
    path.push(id);

    let node = composition
        .node(id)
        .expect("marked nodes exist in the composition");
    for dependency in node.dependencies() {
        visit(dependency, composition, marks, path)?;
    }

    path.pop();
    marks.insert(id, Mark::Done);
    Ok(())
}

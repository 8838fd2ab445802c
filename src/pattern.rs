//! Declarative sub-graph templates and the matching algorithm.
//!
//! A [`Pattern`] is built bottom-up from leaf labels to a root predicate;
//! [`matches`] walks every node in the graph and attempts a local match,
//! recursively matching each pattern input against the candidate's actual
//! inputs. Matching is deterministic and performs no mutation; which match
//! to act on, and in what order, is entirely the rewrite engine's business.

use crate::graph::{Graph, NodeData, NodeId};
use rustc_hash::FxHashMap;

/// Predicate over a candidate node, used by [`Pattern::Any`].
pub type NodePredicate = Box<dyn Fn(&NodeData) -> bool>;

/// A node of a pattern template.
pub enum Pattern {
    /// Binds any node under `name`.
    Label { name: &'static str },
    /// Binds a node under `name`, requiring it to be a constant leaf.
    Constant { name: &'static str },
    /// Matches a node satisfying `predicate` whose inputs match `inputs`
    /// positionally.
    Any {
        predicate: NodePredicate,
        inputs: Vec<Pattern>,
    },
}

impl Pattern {
    pub fn label(name: &'static str) -> Self {
        Pattern::Label { name }
    }

    pub fn constant(name: &'static str) -> Self {
        Pattern::Constant { name }
    }

    pub fn any(predicate: impl Fn(&NodeData) -> bool + 'static, inputs: Vec<Pattern>) -> Self {
        Pattern::Any {
            predicate: Box::new(predicate),
            inputs,
        }
    }
}

/// A successful binding of a pattern onto the graph.
#[derive(Debug, Clone)]
pub struct Match {
    /// The graph node matched by the pattern root.
    pub root: NodeId,
    /// Label name to bound node. Each label binds exactly one node.
    pub bindings: FxHashMap<&'static str, NodeId>,
}

/// Lazily yields every match of `pattern` in `graph`, trying each node as a
/// candidate root in topological order.
pub fn matches<'a>(graph: &'a Graph, pattern: &'a Pattern) -> impl Iterator<Item = Match> + 'a {
    graph.node_ids().filter_map(move |id| {
        let mut bindings = FxHashMap::default();
        match_node(graph, id, pattern, &mut bindings).then_some(Match { root: id, bindings })
    })
}

fn match_node(
    graph: &Graph,
    id: NodeId,
    pattern: &Pattern,
    bindings: &mut FxHashMap<&'static str, NodeId>,
) -> bool {
    let node = match graph.get(id) {
        Some(node) => node,
        None => return false,
    };
    match pattern {
        Pattern::Label { name } => bind(bindings, name, id),
        Pattern::Constant { name } => node.op.is_constant() && bind(bindings, name, id),
        Pattern::Any { predicate, inputs } => {
            predicate(node)
                && node.src.len() == inputs.len()
                && node
                    .src
                    .iter()
                    .zip(inputs)
                    .all(|(&s, p)| match_node(graph, s, p, bindings))
        }
    }
}

/// A label binds to exactly one concrete node per match; a second occurrence
/// only matches if it names the same node.
fn bind(bindings: &mut FxHashMap<&'static str, NodeId>, name: &'static str, id: NodeId) -> bool {
    match bindings.get(name) {
        Some(&bound) => bound == id,
        None => {
            bindings.insert(name, id);
            true
        }
    }
}

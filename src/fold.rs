//! The constant-folding pass.
//!
//! Drives the pattern matcher across the graph, evaluates matched subgraphs
//! whose inputs are statically known, and replaces each matched root with a
//! constant node carrying the original's name. Scans repeat until a fixed
//! point, since a fold can expose new foldable subgraphs among the folded
//! node's consumers; termination holds because each successful fold strictly
//! shrinks the count of non-constant nodes.

use crate::error::{EvalError, FoldSkip, GraphError};
use crate::eval::evaluate;
use crate::graph::{Graph, NodeId};
use crate::pattern::{matches, Match, Pattern};
use crate::tensor::TensorDesc;
use log::debug;
use rustc_hash::FxHashSet;

/// One registered fold rule: a pattern locating a foldable root whose
/// inputs are all constants. An op kind is foldable only if both a pattern
/// here and an evaluator kernel exist for it; unregistered kinds pass
/// through structurally untouched.
struct FoldRule {
    name: &'static str,
    pattern: Pattern,
}

/// The constant-folding rewrite engine.
pub struct ConstantFolding {
    rules: Vec<FoldRule>,
}

impl Default for ConstantFolding {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantFolding {
    /// Builds the pass with its full rule set: elementwise comparison and
    /// boolean logical reduction.
    pub fn new() -> Self {
        let comparison = FoldRule {
            name: "ConstantFolding.Comparison",
            pattern: Pattern::any(
                |n| n.op.compare_kind().is_some(),
                vec![Pattern::constant("lhs"), Pattern::constant("rhs")],
            ),
        };
        // The axes leaf must be an integer constant; the data leaf is any
        // constant, bound so the callback side can name it.
        let integer_constant = |n: &crate::graph::NodeData| {
            n.op
                .as_constant()
                .is_some_and(|lit| lit.dtype().is_integer())
        };
        let logical_reduction = FoldRule {
            name: "ConstantFolding.LogicalReduction",
            pattern: Pattern::any(
                |n| n.op.reduce_kind().is_some(),
                vec![
                    Pattern::constant("data"),
                    Pattern::any(integer_constant, vec![]),
                ],
            ),
        };
        ConstantFolding {
            rules: vec![comparison, logical_reduction],
        }
    }

    /// Runs the pass to its fixed point, then garbage-collects nodes no
    /// longer reachable from the outputs. Returns `true` if anything folded.
    ///
    /// Recoverable conditions (a still-dynamic dimension, an element type
    /// with no kernel) only decide which candidates fold; an error from this
    /// function is a logic bug and the graph should be discarded.
    pub fn run(&self, graph: &mut Graph) -> Result<bool, GraphError> {
        let mut folded_any = false;
        // Roots already folded or skipped; skip reasons are permanent (a
        // fold changes neither staticness nor element types), so a full scan
        // that yields nothing new is the fixed point.
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();

        loop {
            let candidate = self.next_candidate(graph, &visited);
            let Some((rule_name, m)) = candidate else {
                break;
            };
            visited.insert(m.root);
            debug!(
                "{} matched root '{}'",
                rule_name,
                graph.name(m.root)
            );
            if self.try_fold(graph, &m)? {
                folded_any = true;
            }
        }

        let removed = graph.sweep_unreachable();
        if removed > 0 {
            debug!("constant folding swept {removed} unreachable nodes");
        }
        Ok(folded_any)
    }

    fn next_candidate(
        &self,
        graph: &Graph,
        visited: &FxHashSet<NodeId>,
    ) -> Option<(&'static str, Match)> {
        self.rules.iter().find_map(|rule| {
            matches(graph, &rule.pattern)
                .find(|m| !visited.contains(&m.root))
                .map(|m| (rule.name, m))
        })
    }

    /// Attempts one fold. `Ok(false)` means the candidate was skipped for a
    /// recoverable reason and the node stays in place.
    fn try_fold(&self, graph: &mut Graph, m: &Match) -> Result<bool, GraphError> {
        let root = m.root;
        if graph.get(root).is_some_and(|n| n.fold_disabled) {
            debug!("skipping '{}': folding disabled on node", graph.name(root));
            return Ok(false);
        }

        // Inputs may have become constant since construction; re-infer the
        // descriptor before trusting it.
        graph.revalidate(root)?;
        if !graph.is_fully_static(root) {
            debug!("skipping '{}': {}", graph.name(root), FoldSkip::NotStatic);
            return Ok(false);
        }

        let literal = match evaluate(graph, root) {
            Ok(literal) => literal,
            Err(EvalError::Skip(skip)) => {
                debug!("skipping '{}': {skip}", graph.name(root));
                return Ok(false);
            }
            Err(EvalError::Graph(err)) => return Err(err),
        };

        let inferred = TensorDesc::new(graph.dtype(root), graph.shape(root).clone());
        if literal.desc() != &inferred {
            return Err(GraphError::Consistency(format!(
                "folded value for '{}' has descriptor {} {}, inferred {} {}",
                graph.name(root),
                literal.dtype(),
                literal.shape(),
                inferred.dtype,
                inferred.shape
            )));
        }

        let name = graph.name(root).to_string();
        let constant = graph.add_constant(literal);
        graph.set_name(constant, name);
        graph.replace(root, constant)?;
        debug!("folded '{}' into a constant", graph.name(constant));
        Ok(true)
    }
}

/// Runs constant folding on `graph` in place, returning the same handle so
/// callers can chain further passes.
pub fn run_constant_folding(graph: &mut Graph) -> Result<&mut Graph, GraphError> {
    ConstantFolding::new().run(graph)?;
    Ok(graph)
}

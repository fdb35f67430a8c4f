use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::{AppError, Result};
use crate::workflow::types::Stage;

/// A vertex of the workflow graph: the synthetic start and end, or a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Start,
    Stage(Stage),
    End,
}

/// Directed, acyclic graph of the transitions a run may take. Routing
/// decisions are checked against it.
pub struct StageGraph {
    graph: DiGraph<Node, ()>,
    indices: HashMap<Node, NodeIndex>,
}

impl StageGraph {
    /// The policy-desk topology:
    ///
    /// ```text
    /// Start -> Triage -> AutoResolve -> End
    ///             |           |-> RequestInfo -> End
    ///             |           '-> OpenTicket  -> End
    ///             |-> RequestInfo
    ///             '-> OpenTicket
    /// ```
    pub fn standard() -> Result<Self> {
        let stage = Node::Stage;

        Self::from_edges(&[
            (Node::Start, stage(Stage::Triage)),
            (stage(Stage::Triage), stage(Stage::AutoResolve)),
            (stage(Stage::Triage), stage(Stage::RequestInfo)),
            (stage(Stage::Triage), stage(Stage::OpenTicket)),
            (stage(Stage::AutoResolve), Node::End),
            (stage(Stage::AutoResolve), stage(Stage::RequestInfo)),
            (stage(Stage::AutoResolve), stage(Stage::OpenTicket)),
            (stage(Stage::RequestInfo), Node::End),
            (stage(Stage::OpenTicket), Node::End),
        ])
    }

    /// Build a graph from explicit edges. Cyclic topologies are rejected so
    /// that no stage can ever be re-entered within a run.
    pub fn from_edges(edges: &[(Node, Node)]) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();

        for (from, to) in edges {
            let a = *indices.entry(*from).or_insert_with(|| graph.add_node(*from));
            let b = *indices.entry(*to).or_insert_with(|| graph.add_node(*to));
            graph.add_edge(a, b, ());
        }

        if petgraph::algo::is_cyclic_directed(&graph) {
            return Err(AppError::Workflow("Stage graph contains a cycle".to_string()));
        }

        Ok(Self { graph, indices })
    }

    pub fn allows(&self, from: Node, to: Node) -> bool {
        match (self.indices.get(&from), self.indices.get(&to)) {
            (Some(a), Some(b)) => self.graph.find_edge(*a, *b).is_some(),
            _ => false,
        }
    }

    pub fn successors(&self, node: Node) -> Vec<Node> {
        let Some(idx) = self.indices.get(&node) else {
            return Vec::new();
        };
        let mut next: Vec<Node> = self
            .graph
            .neighbors_directed(*idx, Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect();
        // petgraph yields neighbors newest-edge first
        next.reverse();
        next
    }

    /// The single stage reached unconditionally from `Start`.
    pub fn entry(&self) -> Result<Node> {
        match self.successors(Node::Start).as_slice() {
            [only] => Ok(*only),
            other => Err(AppError::Workflow(format!(
                "Start must have exactly one outgoing edge, found {}",
                other.len()
            ))),
        }
    }
}

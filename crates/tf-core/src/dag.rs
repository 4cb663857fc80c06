//! Stage dependency graph and topological ordering

use crate::error::{CoreError, CoreResult};
use crate::stage::StageId;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

/// A directed acyclic graph of stage dependencies
#[derive(Debug, Default)]
pub struct StageDag {
    /// The underlying graph; edges point from upstream to downstream
    graph: DiGraph<StageId, ()>,

    /// Map from stage id to node index
    node_map: HashMap<StageId, NodeIndex>,
}

impl StageDag {
    /// Create a new empty DAG
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage to the DAG
    pub fn add_stage(&mut self, id: &StageId) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.node_map.insert(id.clone(), idx);
        idx
    }

    /// Add a dependency edge: `stage` runs after `upstream`
    pub fn add_dependency(&mut self, stage: &StageId, upstream: &StageId) {
        let stage_idx = self.add_stage(stage);
        let upstream_idx = self.add_stage(upstream);
        self.graph.update_edge(upstream_idx, stage_idx, ());
    }

    /// Build the DAG from `(stage, upstream stages)` pairs and reject cycles
    pub fn build<'a, I>(stages: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (&'a StageId, &'a [StageId])>,
    {
        let mut dag = Self::new();
        let stages: Vec<_> = stages.into_iter().collect();

        for (id, _) in &stages {
            dag.add_stage(id);
        }
        for (id, upstream) in &stages {
            for dep in upstream.iter() {
                dag.add_dependency(id, dep);
            }
        }

        dag.validate()?;
        Ok(dag)
    }

    /// Validate the DAG has no cycles
    pub fn validate(&self) -> CoreResult<()> {
        self.topological_order().map(|_| ())
    }

    /// Find a cycle path starting from a node for error reporting
    fn find_cycle_path(&self, start: NodeIndex) -> String {
        let mut path: Vec<String> = vec![self.graph[start].to_string()];
        let mut current = start;
        let mut visited = HashSet::new();
        visited.insert(current);

        while let Some(edge) = self.graph.edges(current).next() {
            let target = edge.target();
            path.push(self.graph[target].to_string());

            if target == start || visited.contains(&target) {
                break;
            }

            visited.insert(target);
            current = target;
        }

        path.join(" -> ")
    }

    /// Stages in topological order (upstream first).
    ///
    /// Ties are broken by stage id so the order is stable across builds.
    pub fn topological_order(&self) -> CoreResult<Vec<StageId>> {
        if let Err(cycle) = toposort(&self.graph, None) {
            return Err(CoreError::CircularDependency {
                cycle: self.find_cycle_path(cycle.node_id()),
            });
        }

        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                let degree = self
                    .graph
                    .edges_directed(idx, petgraph::Direction::Incoming)
                    .count();
                (idx, degree)
            })
            .collect();
        let mut ready: std::collections::BTreeMap<&StageId, NodeIndex> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| (&self.graph[*idx], *idx))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((id, idx)) = ready.pop_first() {
            order.push(id.clone());
            for edge in self.graph.edges_directed(idx, petgraph::Direction::Outgoing) {
                let target = edge.target();
                if let Some(degree) = in_degree.get_mut(&target) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(&self.graph[target], target);
                    }
                }
            }
        }
        Ok(order)
    }

    /// Direct upstream stages of `stage`
    pub fn upstream(&self, stage: &str) -> Vec<StageId> {
        self.neighbors(stage, petgraph::Direction::Incoming)
    }

    /// Direct downstream stages of `stage`
    pub fn downstream(&self, stage: &str) -> Vec<StageId> {
        self.neighbors(stage, petgraph::Direction::Outgoing)
    }

    fn neighbors(&self, stage: &str, direction: petgraph::Direction) -> Vec<StageId> {
        let Some(&idx) = self.node_map.get(stage) else {
            return Vec::new();
        };
        let mut out: Vec<StageId> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| match direction {
                petgraph::Direction::Incoming => self.graph[e.source()].clone(),
                petgraph::Direction::Outgoing => self.graph[e.target()].clone(),
            })
            .collect();
        out.sort();
        out
    }

    /// All `(upstream, downstream)` edges, sorted
    pub fn edges(&self) -> Vec<(StageId, StageId)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| (self.graph[e.source()].clone(), self.graph[e.target()].clone()))
            .collect();
        edges.sort();
        edges
    }

    /// Check if a stage exists in the DAG
    pub fn contains(&self, stage: &str) -> bool {
        self.node_map.contains_key(stage)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

#[cfg(test)]
#[path = "dag_test.rs"]
mod tests;

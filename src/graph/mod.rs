//! Aliasable dependency graph.
//!
//! Nodes are package names. An edge `child -> parent` means `child` depends on
//! `parent`, so a node's outgoing neighbours are its prerequisites and its
//! incoming neighbours are its dependents. Cycles are rejected when an edge is
//! inserted, which keeps [`DependencyGraph::topo_sorted_layers`] total.

mod dot;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use thiserror::Error;

/// Errors raised by graph mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("`{0}` cannot depend on itself")]
    SelfReferential(String),

    #[error("circular dependency: `{parent}` already depends on `{child}`")]
    Circular { child: String, parent: String },

    #[error("alias `{alias}` already refers to `{existing}`, cannot point it at `{name}`")]
    ConflictingAlias {
        alias: String,
        existing: String,
        name: String,
    },

    #[error("`{alias}` is a node of its own, cannot make it an alias of `{name}`")]
    AliasShadowsNode { alias: String, name: String },

    #[error("no node named `{0}`")]
    UnknownNode(String),
}

/// A directed acyclic graph of package names carrying one payload per node.
#[derive(Debug, Clone)]
pub struct DependencyGraph<V> {
    graph: StableDiGraph<String, ()>,
    nodes: BTreeMap<String, NodeIndex>,
    info: BTreeMap<String, V>,
    /// alias -> canonical name
    aliases: BTreeMap<String, String>,
    /// canonical name -> aliases
    provided: BTreeMap<String, BTreeSet<String>>,
}

impl<V> Default for DependencyGraph<V> {
    fn default() -> Self {
        DependencyGraph {
            graph: StableDiGraph::new(),
            nodes: BTreeMap::new(),
            info: BTreeMap::new(),
            aliases: BTreeMap::new(),
            provided: BTreeMap::new(),
        }
    }
}

impl<V> DependencyGraph<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical name for `name`, following aliases.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }

    /// Add a node if it is not already present.
    pub fn add_node(&mut self, name: &str) {
        let name = self.resolve(name).to_string();
        if !self.nodes.contains_key(&name) {
            let idx = self.graph.add_node(name.clone());
            self.nodes.insert(name, idx);
        }
    }

    /// Register `alias` as another name for `name`.
    pub fn alias(&mut self, name: &str, alias: &str) -> Result<(), GraphError> {
        let canonical = self.resolve(name).to_string();
        if !self.nodes.contains_key(&canonical) {
            return Err(GraphError::UnknownNode(name.to_string()));
        }
        if alias == canonical {
            return Ok(());
        }

        if let Some(existing) = self.aliases.get(alias) {
            if *existing == canonical {
                return Ok(());
            }
            return Err(GraphError::ConflictingAlias {
                alias: alias.to_string(),
                existing: existing.clone(),
                name: canonical,
            });
        }
        if self.nodes.contains_key(alias) {
            return Err(GraphError::AliasShadowsNode {
                alias: alias.to_string(),
                name: canonical,
            });
        }

        self.aliases.insert(alias.to_string(), canonical.clone());
        self.provided
            .entry(canonical)
            .or_default()
            .insert(alias.to_string());
        Ok(())
    }

    /// Aliases registered for a node.
    pub fn aliases_of(&self, name: &str) -> BTreeSet<String> {
        self.provided
            .get(self.resolve(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Record that `child` depends on `parent`.
    ///
    /// Both ends are resolved through aliases and created if missing. Nothing
    /// is mutated when an error is returned.
    pub fn depend_on(&mut self, child: &str, parent: &str) -> Result<(), GraphError> {
        let child = self.resolve(child).to_string();
        let parent = self.resolve(parent).to_string();

        if child == parent {
            return Err(GraphError::SelfReferential(child));
        }

        if let (Some(&c), Some(&p)) = (self.nodes.get(&child), self.nodes.get(&parent)) {
            if has_path_connecting(&self.graph, p, c, None) {
                return Err(GraphError::Circular { child, parent });
            }
        }

        self.add_node(&child);
        self.add_node(&parent);
        let c = self.nodes[&child];
        let p = self.nodes[&parent];
        self.graph.update_edge(c, p, ());
        Ok(())
    }

    /// Whether `name` is a node or an alias of one.
    pub fn exists(&self, name: &str) -> bool {
        self.nodes.contains_key(self.resolve(name))
    }

    /// Attach a payload to an existing node.
    pub fn set_node_info(&mut self, name: &str, value: V) -> Result<(), GraphError> {
        let name = self.resolve(name).to_string();
        if !self.nodes.contains_key(&name) {
            return Err(GraphError::UnknownNode(name));
        }
        self.info.insert(name, value);
        Ok(())
    }

    pub fn node_info(&self, name: &str) -> Option<&V> {
        self.info.get(self.resolve(name))
    }

    /// Nodes with no prerequisites, sorted by name.
    pub fn leaves(&self) -> Vec<String> {
        Self::leaves_of(&self.graph)
    }

    fn leaves_of(graph: &StableDiGraph<String, ()>) -> Vec<String> {
        let mut leaves: Vec<String> = graph
            .node_indices()
            .filter(|&n| {
                graph
                    .neighbors_directed(n, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|n| graph[n].clone())
            .collect();
        leaves.sort();
        leaves
    }

    /// Partition all nodes into layers, prerequisites first.
    ///
    /// Every node appears exactly once, and all of its prerequisites sit in
    /// strictly earlier layers.
    pub fn topo_sorted_layers(&self) -> Vec<Vec<String>> {
        let mut graph = self.graph.clone();
        let mut index: BTreeMap<String, NodeIndex> = self.nodes.clone();
        let mut layers = Vec::new();

        while graph.node_count() > 0 {
            let leaves = Self::leaves_of(&graph);
            if leaves.is_empty() {
                // Unreachable while edge insertion rejects cycles.
                break;
            }
            for name in &leaves {
                if let Some(idx) = index.remove(name) {
                    graph.remove_node(idx);
                }
            }
            layers.push(leaves);
        }

        layers
    }

    /// Transitive prerequisites of `name`.
    pub fn dependencies(&self, name: &str) -> BTreeSet<String> {
        self.walk(name, Direction::Outgoing)
    }

    /// Transitive dependents of `name`.
    pub fn dependents(&self, name: &str) -> BTreeSet<String> {
        self.walk(name, Direction::Incoming)
    }

    /// Direct prerequisites of `name`.
    pub fn immediate_dependencies(&self, name: &str) -> BTreeSet<String> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Direct dependents of `name`.
    pub fn immediate_dependents(&self, name: &str) -> BTreeSet<String> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbors(&self, name: &str, dir: Direction) -> BTreeSet<String> {
        match self.nodes.get(self.resolve(name)) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, dir)
                .map(|n| self.graph[n].clone())
                .collect(),
            None => BTreeSet::new(),
        }
    }

    fn walk(&self, name: &str, dir: Direction) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let Some(&start) = self.nodes.get(self.resolve(name)) else {
            return seen;
        };

        let mut queue = VecDeque::from([start]);
        while let Some(idx) = queue.pop_front() {
            for next in self.graph.neighbors_directed(idx, dir) {
                if seen.insert(self.graph[next].clone()) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    /// Remove `name` and any prerequisites it leaves orphaned.
    ///
    /// A prerequisite is removed when nothing else depends on it and `retain`
    /// does not claim it; nodes without a payload are never retained.
    /// Dependents of `name` are kept. Returns every removed name.
    pub fn prune<F>(&mut self, name: &str, retain: F) -> BTreeSet<String>
    where
        F: Fn(&V) -> bool,
    {
        let mut removed = BTreeSet::new();
        let root = self.resolve(name).to_string();
        if !self.nodes.contains_key(&root) {
            return removed;
        }

        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            let Some(idx) = self.nodes.remove(&current) else {
                continue;
            };
            let prerequisites: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .collect();

            self.graph.remove_node(idx);
            self.info.remove(&current);
            if let Some(aliases) = self.provided.remove(&current) {
                for alias in aliases {
                    self.aliases.remove(&alias);
                }
            }
            removed.insert(current);

            for prereq in prerequisites {
                let orphaned = self
                    .graph
                    .neighbors_directed(prereq, Direction::Incoming)
                    .next()
                    .is_none();
                let prereq_name = self.graph[prereq].clone();
                let retained = self.info.get(&prereq_name).is_some_and(&retain);
                if orphaned && !retained {
                    queue.push_back(prereq_name);
                }
            }
        }

        removed
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All node names, sorted.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// All `(child, parent)` edges, sorted.
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(c, p)| (self.graph[c].clone(), self.graph[p].clone()))
            .collect();
        edges.sort();
        edges
    }

    /// Payloads in layer order, for nodes that carry one.
    pub fn topo_sorted_layer_map(&self) -> Vec<BTreeMap<String, V>>
    where
        V: Clone,
    {
        self.topo_sorted_layers()
            .into_iter()
            .map(|layer| {
                layer
                    .into_iter()
                    .filter_map(|name| self.info.get(&name).cloned().map(|v| (name, v)))
                    .collect::<BTreeMap<_, _>>()
            })
            .filter(|layer| !layer.is_empty())
            .collect()
    }
}

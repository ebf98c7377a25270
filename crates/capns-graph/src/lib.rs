// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-graph
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The directed media-conversion graph: one node per (canonical) media
//! URN, one edge per registered cap that converts between two *concrete*
//! media types. Caps whose `in`/`out` fields are the wildcard `*` describe
//! no single conversion edge and are not inserted — they are still
//! reachable through [`capns_catalog::CapCatalog`] pattern lookup, just not
//! through path-finding.

use std::collections::{HashMap, HashSet, VecDeque};

use capns_catalog::{Cap, CapCatalog};
use capns_urn::CapUrn;

/// One edge of the media graph: a single cap converting `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Source node: canonical media URN text.
    pub from: String,
    /// Target node: canonical media URN text.
    pub to: String,
    /// The cap this edge represents.
    pub cap_urn: CapUrn,
    /// The registry (manifest/plugin) name the cap was registered under.
    pub registry_name: String,
    /// The cap URN's specificity score, cached for sorting.
    pub specificity: u32,
}

/// The directed, multi-edge graph of media conversions.
#[derive(Debug, Clone, Default)]
pub struct MediaGraph {
    nodes: HashSet<String>,
    edges: Vec<Edge>,
    outgoing_index: HashMap<String, Vec<usize>>,
    incoming_index: HashMap<String, Vec<usize>>,
}

impl MediaGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from every cap in `catalog`, one edge per cap whose
    /// `in`/`out` fields are both concrete.
    #[must_use]
    pub fn from_catalog(catalog: &CapCatalog) -> Self {
        let mut graph = Self::new();
        for entry in catalog.iter() {
            graph.insert_cap(&entry.cap, &entry.registry_name);
        }
        graph
    }

    /// Insert one edge for `cap`, if both its `in` and `out` fields are
    /// concrete media types. No-op for wildcard-typed caps.
    pub fn insert_cap(&mut self, cap: &Cap, registry_name: &str) {
        let (Some(from), Some(to)) = (cap.urn.in_field().as_concrete().cloned(), cap.urn.out_field().as_concrete().cloned()) else {
            return;
        };
        let from = from.to_string();
        let to = to.to_string();
        self.nodes.insert(from.clone());
        self.nodes.insert(to.clone());
        let idx = self.edges.len();
        self.edges.push(Edge {
            from: from.clone(),
            to: to.clone(),
            cap_urn: cap.urn.clone(),
            registry_name: registry_name.to_owned(),
            specificity: cap.urn.specificity(),
        });
        self.outgoing_index.entry(from).or_default().push(idx);
        self.incoming_index.entry(to).or_default().push(idx);
    }

    /// All distinct node canonical texts.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    /// Total number of edges (including parallel multi-edges).
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges leaving `node`.
    #[must_use]
    pub fn outgoing(&self, node: &str) -> Vec<&Edge> {
        self.outgoing_index
            .get(node)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
            .collect()
    }

    /// Edges entering `node`.
    #[must_use]
    pub fn incoming(&self, node: &str) -> Vec<&Edge> {
        self.incoming_index
            .get(node)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
            .collect()
    }

    /// `true` iff at least one direct edge connects `from` to `to`.
    #[must_use]
    pub fn has_direct_edge(&self, from: &str, to: &str) -> bool {
        self.outgoing(from).iter().any(|e| e.to == to)
    }

    /// All direct edges from `from` to `to`, specificity-descending.
    #[must_use]
    pub fn direct_edges(&self, from: &str, to: &str) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.outgoing(from).into_iter().filter(|e| e.to == to).collect();
        edges.sort_by(|a, b| b.specificity.cmp(&a.specificity));
        edges
    }

    /// `true` iff `to` is reachable from `from` via any number of edges.
    #[must_use]
    pub fn can_convert(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([from.to_owned()]);
        visited.insert(from.to_owned());
        while let Some(node) = queue.pop_front() {
            for edge in self.outgoing(&node) {
                if edge.to == to {
                    return true;
                }
                if visited.insert(edge.to.clone()) {
                    queue.push_back(edge.to.clone());
                }
            }
        }
        false
    }

    /// Shortest path from `from` to `to` by edge count (BFS); at each node,
    /// among parallel edges toward the frontier, the highest-specificity
    /// edge is preferred. Returns `None` if `to` is unreachable.
    ///
    /// Paths never revisit a node (simple paths only), matching
    /// [`Self::find_all_paths`]'s guarantee.
    #[must_use]
    pub fn find_path(&self, from: &str, to: &str) -> Option<Vec<Edge>> {
        if from == to {
            return Some(Vec::new());
        }
        let mut visited: HashSet<String> = HashSet::from([from.to_owned()]);
        let mut queue: VecDeque<String> = VecDeque::from([from.to_owned()]);
        let mut came_from: HashMap<String, Edge> = HashMap::new();

        'bfs: while let Some(node) = queue.pop_front() {
            // Group parallel edges toward each distinct neighbor, preferring
            // the most specific one first.
            let mut by_target: HashMap<String, &Edge> = HashMap::new();
            for edge in self.outgoing(&node) {
                let better = by_target
                    .get(&edge.to)
                    .is_none_or(|cur| edge.specificity > cur.specificity);
                if better {
                    by_target.insert(edge.to.clone(), edge);
                }
            }
            let mut targets: Vec<&String> = by_target.keys().collect();
            targets.sort();
            for target in targets {
                if visited.contains(target) {
                    continue;
                }
                visited.insert(target.clone());
                came_from.insert(target.clone(), by_target[target].clone());
                if target == to {
                    break 'bfs;
                }
                queue.push_back(target.clone());
            }
        }

        if !came_from.contains_key(to) && from != to {
            return None;
        }
        let mut path = Vec::new();
        let mut cursor = to.to_owned();
        while let Some(edge) = came_from.get(&cursor) {
            cursor = edge.from.clone();
            path.push(edge.clone());
        }
        path.reverse();
        Some(path)
    }

    /// All simple paths from `from` to `to` with at most `max_depth` edges,
    /// deduplicated by edge sequence, sorted ascending by length then
    /// descending by summed specificity.
    #[must_use]
    pub fn find_all_paths(&self, from: &str, to: &str, max_depth: usize) -> Vec<Vec<Edge>> {
        let mut results = Vec::new();
        let mut stack = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(from.to_owned());
        self.dfs_paths(from, to, max_depth, &mut stack, &mut visited, &mut results);

        let mut seen = HashSet::new();
        results.retain(|path: &Vec<Edge>| {
            let key: Vec<String> = path.iter().map(|e| e.cap_urn.to_string()).collect();
            seen.insert(key)
        });
        results.sort_by(|a, b| {
            a.len()
                .cmp(&b.len())
                .then_with(|| summed_specificity(b).cmp(&summed_specificity(a)))
        });
        results
    }

    fn dfs_paths(
        &self,
        current: &str,
        to: &str,
        max_depth: usize,
        stack: &mut Vec<Edge>,
        visited: &mut HashSet<String>,
        results: &mut Vec<Vec<Edge>>,
    ) {
        if current == to && !stack.is_empty() {
            results.push(stack.clone());
            return;
        }
        if stack.len() >= max_depth {
            return;
        }
        for edge in self.outgoing(current) {
            if visited.contains(&edge.to) {
                continue;
            }
            visited.insert(edge.to.clone());
            stack.push(edge.clone());
            self.dfs_paths(&edge.to.clone(), to, max_depth, stack, visited, results);
            stack.pop();
            visited.remove(&edge.to);
        }
    }

    /// The path from `from` to `to` maximizing summed specificity, tied by
    /// shorter length, then by lexicographic order of the path's cap URN
    /// sequence.
    #[must_use]
    pub fn find_best_path(&self, from: &str, to: &str, max_depth: usize) -> Option<Vec<Edge>> {
        let mut candidates = self.find_all_paths(from, to, max_depth);
        if from == to {
            candidates.push(Vec::new());
        }
        candidates.into_iter().min_by(|a, b| {
            summed_specificity(b)
                .cmp(&summed_specificity(a))
                .then_with(|| a.len().cmp(&b.len()))
                .then_with(|| cap_urn_sequence(a).cmp(&cap_urn_sequence(b)))
        })
    }
}

fn summed_specificity(path: &[Edge]) -> u32 {
    path.iter().map(|e| e.specificity).sum()
}

fn cap_urn_sequence(path: &[Edge]) -> Vec<String> {
    path.iter().map(|e| e.cap_urn.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use capns_catalog::Cap;

    fn cap(urn: &str) -> Cap {
        Cap {
            urn: CapUrn::parse(urn).unwrap(),
            title: urn.to_owned(),
            description: None,
            command: "c".into(),
            args: vec![],
            output: None,
            media_specs: vec![],
        }
    }

    fn sample_graph() -> MediaGraph {
        let mut catalog = CapCatalog::new();
        catalog.register(
            "plugin-a",
            vec![
                cap("cap:in=media:pdf;out=\"media:image;png\";op=rasterize"),
                cap(
                    "cap:in=\"media:image;png\";out=\"media:image;png;thumbnail\";op=thumbnail",
                ),
            ],
        );
        MediaGraph::from_catalog(&catalog)
    }

    #[test]
    fn wildcard_caps_are_not_inserted_as_edges() {
        let mut catalog = CapCatalog::new();
        catalog.register("plugin-a", vec![Cap::identity()]);
        let graph = MediaGraph::from_catalog(&catalog);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn find_path_chains_two_edges() {
        let graph = sample_graph();
        let path = graph
            .find_path("media:pdf", "media:image;png;thumbnail")
            .unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(
            path[0].cap_urn.to_string(),
            "cap:in=media:pdf;op=rasterize;out=\"media:image;png\""
        );
        assert_eq!(
            path[1].cap_urn.to_string(),
            "cap:in=\"media:image;png\";op=thumbnail;out=\"media:image;png;thumbnail\""
        );
    }

    #[test]
    fn can_convert_reflects_reachability() {
        let graph = sample_graph();
        assert!(graph.can_convert("media:pdf", "media:image;png;thumbnail"));
        assert!(!graph.can_convert("media:image;png;thumbnail", "media:pdf"));
    }

    #[test]
    fn find_path_same_node_is_empty_path() {
        let graph = sample_graph();
        assert_eq!(graph.find_path("media:pdf", "media:pdf"), Some(Vec::new()));
    }

    #[test]
    fn find_path_unreachable_is_none() {
        let graph = sample_graph();
        assert_eq!(graph.find_path("media:docx", "media:pdf"), None);
    }

    #[test]
    fn find_best_path_prefers_higher_specificity() {
        let mut catalog = CapCatalog::new();
        catalog.register(
            "plugin-a",
            vec![
                cap("cap:in=media:pdf;out=\"media:image;png\";op=low"),
                cap("cap:in=media:pdf;out=\"media:image;png\";op=high;quality=max"),
            ],
        );
        let graph = MediaGraph::from_catalog(&catalog);
        let best = graph.find_best_path("media:pdf", "media:image;png", 4).unwrap();
        assert_eq!(best.len(), 1);
        assert!(best[0].cap_urn.to_string().contains("quality=max"));
    }

    #[test]
    fn find_all_paths_sorted_ascending_length_then_specificity_desc() {
        let mut catalog = CapCatalog::new();
        catalog.register(
            "plugin-a",
            vec![
                cap("cap:in=media:pdf;out=\"media:image;png\";op=direct"),
                cap("cap:in=media:pdf;out=media:intermediate;op=step1"),
                cap("cap:in=media:intermediate;out=\"media:image;png\";op=step2"),
            ],
        );
        let graph = MediaGraph::from_catalog(&catalog);
        let all = graph.find_all_paths("media:pdf", "media:image;png", 4);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].len(), 1);
        assert_eq!(all[1].len(), 2);
    }

    #[test]
    fn cycles_do_not_cause_infinite_recursion_in_all_paths() {
        let mut catalog = CapCatalog::new();
        catalog.register(
            "plugin-a",
            vec![
                cap("cap:in=media:a;out=media:b;op=1"),
                cap("cap:in=media:b;out=media:a;op=2"),
                cap("cap:in=media:b;out=media:c;op=3"),
            ],
        );
        let graph = MediaGraph::from_catalog(&catalog);
        let all = graph.find_all_paths("media:a", "media:c", 10);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].len(), 2);
    }
}

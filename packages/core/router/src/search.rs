//! Path search over a weighted topology: Dijkstra, Yen's k-shortest loopless paths and
//! exhaustive simple path enumeration.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};

use te_sdn_identity::{DatapathLink, NodeId};
use te_sdn_topology::DatapathTopology;

/// Link weights of one query, every link of the graph must have an entry
pub(crate) type LinkWeights = HashMap<DatapathLink, f64>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WeightedPath {
    pub links: Vec<DatapathLink>,
    pub weight: f64,
}

impl WeightedPath {
    fn new(links: Vec<DatapathLink>, weights: &LinkWeights) -> Self {
        let weight = path_weight(&links, weights);
        Self { links, weight }
    }
}

fn path_weight(links: &[DatapathLink], weights: &LinkWeights) -> f64 {
    links.iter().fold(0.0, |acc, l| acc + weights.get(l).copied().unwrap_or(0.0))
}

#[derive(Debug, PartialEq)]
struct Candidate {
    cost: f64,
    node: NodeId,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap on cost, ties broken by node id
        other.cost.total_cmp(&self.cost).then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dijkstra from `src` to `dest` avoiding the banned nodes and links, weights must be non-negative
pub(crate) fn shortest_path(topo: &DatapathTopology, weights: &LinkWeights, src: NodeId, dest: NodeId, banned_nodes: &BTreeSet<NodeId>, banned_links: &BTreeSet<DatapathLink>) -> Option<WeightedPath> {
    if !topo.contains_node(src) || !topo.contains_node(dest) {
        return None;
    }
    if src == dest {
        return Some(WeightedPath { links: vec![], weight: 0.0 });
    }

    let mut dist: HashMap<NodeId, f64> = HashMap::from([(src, 0.0)]);
    let mut prev: HashMap<NodeId, DatapathLink> = HashMap::new();
    let mut heap = BinaryHeap::from([Candidate { cost: 0.0, node: src }]);

    while let Some(Candidate { cost, node }) = heap.pop() {
        if node == dest {
            break;
        }
        if dist.get(&node).map(|d| cost > *d).unwrap_or(false) {
            continue;
        }
        for link in topo.out_links(node) {
            let next = link.dest_node();
            if banned_links.contains(link) || banned_nodes.contains(&next) || next == src {
                continue;
            }
            let weight = weights.get(link).copied().unwrap_or(0.0);
            debug_assert!(weight >= 0.0, "negative weight on {}", link);
            let next_cost = cost + weight;
            if dist.get(&next).map(|d| next_cost < *d).unwrap_or(true) {
                dist.insert(next, next_cost);
                prev.insert(next, *link);
                heap.push(Candidate { cost: next_cost, node: next });
            }
        }
    }

    let mut links = vec![];
    let mut cursor = dest;
    while cursor != src {
        let link = prev.get(&cursor)?;
        links.push(*link);
        cursor = link.src_node();
    }
    links.reverse();
    Some(WeightedPath::new(links, weights))
}

/// Yen's algorithm: up to `k` loopless paths in non-decreasing weight order
pub(crate) fn k_shortest_paths(topo: &DatapathTopology, weights: &LinkWeights, src: NodeId, dest: NodeId, k: usize) -> Vec<WeightedPath> {
    if k == 0 {
        return vec![];
    }
    let first = match shortest_path(topo, weights, src, dest, &BTreeSet::new(), &BTreeSet::new()) {
        Some(path) => path,
        None => return vec![],
    };

    let mut accepted: Vec<WeightedPath> = vec![first];
    // candidate link sequences with their weight
    let mut candidates: BTreeMap<Vec<DatapathLink>, f64> = BTreeMap::new();

    while accepted.len() < k {
        let last = accepted[accepted.len() - 1].links.clone();
        for i in 0..last.len() {
            let spur_node = last[i].src_node();
            let root = &last[..i];

            let banned_links: BTreeSet<DatapathLink> = accepted.iter().filter(|p| p.links.len() > i && p.links[..i] == *root).map(|p| p.links[i]).collect();
            let banned_nodes: BTreeSet<NodeId> = root.iter().map(|l| l.src_node()).collect();

            if let Some(spur) = shortest_path(topo, weights, spur_node, dest, &banned_nodes, &banned_links) {
                let mut links = root.to_vec();
                links.extend(spur.links);
                if accepted.iter().any(|p| p.links == links) || candidates.contains_key(&links) {
                    continue;
                }
                let weight = path_weight(&links, weights);
                candidates.insert(links, weight);
            }
        }

        let best = candidates.iter().min_by(|a, b| a.1.total_cmp(b.1).then_with(|| a.0.len().cmp(&b.0.len()))).map(|(links, _)| links.clone());
        match best {
            Some(links) => {
                candidates.remove(&links);
                accepted.push(WeightedPath::new(links, weights));
            }
            None => break,
        }
    }
    accepted
}

/// Every simple path from `src` to `dest`, stopping after `limit` paths.
///
/// The number of simple paths grows exponentially with the graph size.
pub(crate) fn all_simple_paths(topo: &DatapathTopology, weights: &LinkWeights, src: NodeId, dest: NodeId, limit: usize) -> Vec<WeightedPath> {
    let mut found = vec![];
    if limit == 0 || !topo.contains_node(src) || !topo.contains_node(dest) {
        return found;
    }
    if src == dest {
        found.push(WeightedPath { links: vec![], weight: 0.0 });
        return found;
    }

    let mut visited = BTreeSet::from([src]);
    let mut stack: Vec<DatapathLink> = vec![];
    visit(topo, weights, src, dest, limit, &mut visited, &mut stack, &mut found);
    found
}

#[allow(clippy::too_many_arguments)]
fn visit(topo: &DatapathTopology, weights: &LinkWeights, node: NodeId, dest: NodeId, limit: usize, visited: &mut BTreeSet<NodeId>, stack: &mut Vec<DatapathLink>, found: &mut Vec<WeightedPath>) {
    for link in topo.out_links(node) {
        if found.len() >= limit {
            return;
        }
        let next = link.dest_node();
        if visited.contains(&next) {
            continue;
        }
        stack.push(*link);
        if next == dest {
            found.push(WeightedPath::new(stack.clone(), weights));
        } else {
            visited.insert(next);
            visit(topo, weights, next, dest, limit, visited, stack, found);
            visited.remove(&next);
        }
        stack.pop();
    }
}

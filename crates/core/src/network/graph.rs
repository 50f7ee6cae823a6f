//! Adjacency view of the throat graph
//!
//! Nodes are dense pore indices (position in the id-sorted pore list); edges carry the
//! index of the throat they come from.

use crate::core_types::Throat;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// One incident throat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Dense index of the pore at the other end
    pub to: usize,
    /// Index into the throat list
    pub throat: usize,
}

/// Undirected adjacency lists over dense pore indices
#[derive(Debug, Clone, Default)]
pub struct ThroatGraph {
    adjacency: Vec<Vec<Edge>>,
}

impl ThroatGraph {
    /// Build from a throat list. Throats whose ids are missing from `index` are skipped.
    pub fn build(pore_count: usize, index: &FxHashMap<u32, usize>, throats: &[Throat]) -> Self {
        let mut adjacency = vec![Vec::new(); pore_count];
        for (t, throat) in throats.iter().enumerate() {
            if let (Some(&a), Some(&b)) = (index.get(&throat.pore_id1), index.get(&throat.pore_id2)) {
                adjacency[a].push(Edge { to: b, throat: t });
                adjacency[b].push(Edge { to: a, throat: t });
            }
        }
        Self { adjacency }
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Whether the graph has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Incident edges of `node`.
    #[inline]
    pub fn neighbors(&self, node: usize) -> &[Edge] {
        &self.adjacency[node]
    }

    /// Register a new throat between `a` and `b`.
    pub fn add_edge(&mut self, a: usize, b: usize, throat: usize) {
        self.adjacency[a].push(Edge { to: b, throat });
        self.adjacency[b].push(Edge { to: a, throat });
    }

    /// Breadth-first reachability from every source at once.
    pub fn reachable_from(&self, sources: &[usize]) -> Vec<bool> {
        let mut visited = vec![false; self.len()];
        let mut queue = VecDeque::new();
        for &s in sources {
            if !visited[s] {
                visited[s] = true;
                queue.push_back(s);
            }
        }
        while let Some(node) = queue.pop_front() {
            for edge in &self.adjacency[node] {
                if !visited[edge.to] {
                    visited[edge.to] = true;
                    queue.push_back(edge.to);
                }
            }
        }
        visited
    }

    /// Whether any node in `targets` is reachable from any node in `sources`.
    pub fn connects(&self, sources: &[usize], targets: &[usize]) -> bool {
        let visited = self.reachable_from(sources);
        targets.iter().any(|&t| visited[t])
    }

    /// Connected components, largest first. Ties go to the component holding the lowest index.
    /// Members of each component are ascending.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut sets = UnionFind::new(self.len());
        for (node, edges) in self.adjacency.iter().enumerate() {
            for edge in edges {
                sets.union(node, edge.to);
            }
        }

        let mut by_root: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for node in 0..self.len() {
            by_root.entry(sets.find(node)).or_default().push(node);
        }
        let mut components: Vec<Vec<usize>> = by_root.into_values().collect();
        components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
        components
    }
}

/// Disjoint-set forest with path halving and union by size
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    /// `n` singleton sets.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    /// Representative of `x`'s set.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets of `a` and `b`. Returns `false` if they were already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{Pore, Vec3};

    fn chain_graph() -> ThroatGraph {
        // 0-1-2   3   4-5
        let pores: Vec<Pore> = (0..6)
            .map(|i| Pore::sphere(i, 1.0, Vec3::new(f64::from(i) * 3.0, 0.0, 0.0)))
            .collect();
        let index: FxHashMap<u32, usize> = pores.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
        let throats = vec![
            Throat::between(0, &pores[0], &pores[1], 0.4, 0.1).unwrap(),
            Throat::between(1, &pores[1], &pores[2], 0.4, 0.1).unwrap(),
            Throat::between(2, &pores[4], &pores[5], 0.4, 0.1).unwrap(),
        ];
        ThroatGraph::build(pores.len(), &index, &throats)
    }

    #[test]
    fn test_reachability() {
        let graph = chain_graph();
        let visited = graph.reachable_from(&[0]);
        assert_eq!(visited, vec![true, true, true, false, false, false]);
        assert!(graph.connects(&[0], &[2]));
        assert!(!graph.connects(&[0], &[3, 5]));
    }

    #[test]
    fn test_components_largest_first() {
        let graph = chain_graph();
        let components = graph.components();
        assert_eq!(components, vec![vec![0, 1, 2], vec![4, 5], vec![3]]);
    }

    #[test]
    fn test_union_find() {
        let mut sets = UnionFind::new(4);
        assert!(sets.union(0, 1));
        assert!(sets.union(2, 3));
        assert!(!sets.union(1, 0));
        assert!(sets.union(1, 3));
        assert_eq!(sets.find(0), sets.find(2));
    }
}

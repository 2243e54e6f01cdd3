//! Nesting forest over inner-well time intervals.
//!
//! Node `i` contains node `j` when `j`'s interval lies inside `i`'s (bounds included). The
//! transitive part is removed by excluding, for every node, whatever its contained nodes
//! contain themselves, which leaves only the immediate children.

use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainmentGraph {
    contains: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl ContainmentGraph {
    pub fn from_intervals(intervals: &[(f64, f64)]) -> Self {
        let n = intervals.len();

        let contains: Vec<Vec<usize>> = intervals
            .iter()
            .enumerate()
            .map(|(i, outer)| {
                intervals
                    .iter()
                    .enumerate()
                    .filter(|(j, inner)| *j != i && inner.0 >= outer.0 && inner.1 <= outer.1)
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();

        let exclude: Vec<BTreeSet<usize>> = contains
            .iter()
            .map(|cont| {
                cont.iter()
                    .flat_map(|&c| contains[c].iter().copied())
                    .collect()
            })
            .collect();

        let children: Vec<Vec<usize>> = contains
            .iter()
            .zip(&exclude)
            .map(|(cont, exc)| cont.iter().copied().filter(|c| !exc.contains(c)).collect())
            .collect();

        let mut is_child = vec![false; n];
        for &c in children.iter().flatten() {
            is_child[c] = true;
        }
        let roots = (0..n).filter(|&i| !is_child[i]).collect();

        Self {
            contains,
            children,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.contains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contains.is_empty()
    }

    /// Every node inside `node`, at any depth.
    pub fn contained(&self, node: usize) -> &[usize] {
        &self.contains[node]
    }

    /// Nodes one level below `node`.
    pub fn children(&self, node: usize) -> &[usize] {
        &self.children[node]
    }

    /// Nodes nobody lists as an immediate child.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn has_children(&self, node: usize) -> bool {
        !self.children[node].is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph_has_no_roots() {
        let graph = ContainmentGraph::from_intervals(&[]);
        assert!(graph.is_empty());
        assert!(graph.roots().is_empty());
    }

    #[test]
    fn disjoint_wells_are_both_roots() {
        let graph = ContainmentGraph::from_intervals(&[(0.0, 1.0), (2.0, 3.0)]);
        assert_eq!(graph.roots(), &[0, 1]);
        assert!(!graph.has_children(0));
        assert!(!graph.has_children(1));
    }

    #[test]
    fn three_level_nesting_keeps_only_immediate_children() {
        // A ⊃ B ⊃ C
        let graph = ContainmentGraph::from_intervals(&[(0.0, 10.0), (1.0, 5.0), (2.0, 3.0)]);
        assert_eq!(graph.roots(), &[0]);
        assert_eq!(graph.contained(0), &[1, 2]);
        assert_eq!(graph.children(0), &[1]);
        assert_eq!(graph.children(1), &[2]);
        assert!(graph.children(2).is_empty());
    }

    #[test]
    fn shared_boundaries_count_as_contained() {
        let graph = ContainmentGraph::from_intervals(&[(0.0, 4.0), (0.0, 2.0), (2.0, 4.0)]);
        assert_eq!(graph.roots(), &[0]);
        assert_eq!(graph.children(0), &[1, 2]);
    }

    #[test]
    fn siblings_with_their_own_children() {
        let graph = ContainmentGraph::from_intervals(&[
            (0.0, 10.0),
            (0.5, 4.0),
            (5.0, 9.0),
            (1.0, 2.0),
            (6.0, 7.0),
            (11.0, 12.0),
        ]);
        assert_eq!(graph.roots(), &[0, 5]);
        assert_eq!(graph.children(0), &[1, 2]);
        assert_eq!(graph.children(1), &[3]);
        assert_eq!(graph.children(2), &[4]);
    }
}

//! Dependency graph integrity.
//!
//! Plugins form a directed graph where an edge `A -> B` means "A depends on
//! B". The graph must stay acyclic. Before an edge `new -> candidate` is
//! written, [`would_create_cycle`] walks forward from `candidate`; if `new`
//! is reachable, the edge would close a loop.

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use super::error::StoreError;

/// Read access to outgoing dependency edges.
///
/// Implemented by store transactions so the walk sees exactly the edge set
/// the caller is about to commit against.
#[async_trait]
pub trait DependencyGraph: Send {
    /// Ids of the plugins `id` directly depends on.
    async fn dependencies_of(&mut self, id: Uuid) -> Result<Vec<Uuid>, StoreError>;
}

/// Returns `true` if `new_node` is reachable from `candidate` by following
/// dependency edges forward, i.e. if adding `new_node -> candidate` would
/// create a cycle.
///
/// Iterative depth-first search with a visited set, so it terminates even if
/// the stored graph is already malformed. Stops at the first sighting of
/// `new_node`. Self-loops are not this function's concern; callers reject
/// `candidate == new_node` before calling.
pub async fn would_create_cycle<G>(
    graph: &mut G,
    new_node: Uuid,
    candidate: Uuid,
) -> Result<bool, StoreError>
where
    G: DependencyGraph + ?Sized,
{
    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut stack = vec![candidate];

    while let Some(node) = stack.pop() {
        if node == new_node {
            return Ok(true);
        }
        if !visited.insert(node) {
            continue;
        }
        for next in graph.dependencies_of(node).await? {
            if next == new_node {
                return Ok(true);
            }
            if !visited.contains(&next) {
                stack.push(next);
            }
        }
    }

    Ok(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Adjacency list that counts lookups.
    #[derive(Default)]
    struct Graph {
        edges: HashMap<Uuid, Vec<Uuid>>,
        lookups: usize,
    }

    impl Graph {
        fn edge(&mut self, from: Uuid, to: Uuid) {
            self.edges.entry(from).or_default().push(to);
        }
    }

    #[async_trait]
    impl DependencyGraph for Graph {
        async fn dependencies_of(&mut self, id: Uuid) -> Result<Vec<Uuid>, StoreError> {
            self.lookups += 1;
            Ok(self.edges.get(&id).cloned().unwrap_or_default())
        }
    }

    fn ids<const N: usize>() -> [Uuid; N] {
        std::array::from_fn(|_| Uuid::now_v7())
    }

    #[tokio::test]
    async fn no_edges_no_cycle() {
        let [a, b] = ids();
        let mut graph = Graph::default();
        assert!(!would_create_cycle(&mut graph, a, b).await.unwrap());
    }

    #[tokio::test]
    async fn direct_back_edge_is_a_cycle() {
        // P2 -> P1 exists; P1 -> P2 would close the loop.
        let [p1, p2] = ids();
        let mut graph = Graph::default();
        graph.edge(p2, p1);
        assert!(would_create_cycle(&mut graph, p1, p2).await.unwrap());
    }

    #[tokio::test]
    async fn transitive_back_edge_is_a_cycle() {
        // A -> B -> C; C -> A would close the loop.
        let [a, b, c] = ids();
        let mut graph = Graph::default();
        graph.edge(a, b);
        graph.edge(b, c);
        assert!(would_create_cycle(&mut graph, c, a).await.unwrap());
    }

    #[tokio::test]
    async fn forward_shortcut_is_not_a_cycle() {
        // A -> B -> C; A -> C only adds a parallel path.
        let [a, b, c] = ids();
        let mut graph = Graph::default();
        graph.edge(a, b);
        graph.edge(b, c);
        assert!(!would_create_cycle(&mut graph, a, c).await.unwrap());
    }

    #[tokio::test]
    async fn diamond_is_visited_once_per_node() {
        // candidate -> {x, y} -> z -> w; new node unreachable.
        let [new, candidate, x, y, z, w] = ids();
        let mut graph = Graph::default();
        graph.edge(candidate, x);
        graph.edge(candidate, y);
        graph.edge(x, z);
        graph.edge(y, z);
        graph.edge(z, w);
        assert!(!would_create_cycle(&mut graph, new, candidate).await.unwrap());
        assert_eq!(graph.lookups, 5);
    }

    #[tokio::test]
    async fn terminates_on_existing_cycle() {
        // Malformed data: x <-> y. The walk must still finish.
        let [new, x, y] = ids();
        let mut graph = Graph::default();
        graph.edge(x, y);
        graph.edge(y, x);
        assert!(!would_create_cycle(&mut graph, new, x).await.unwrap());
    }

    #[tokio::test]
    async fn short_circuits_on_first_hit() {
        let [new, candidate, far] = ids();
        let mut graph = Graph::default();
        graph.edge(candidate, new);
        graph.edge(candidate, far);
        assert!(would_create_cycle(&mut graph, new, candidate).await.unwrap());
        assert_eq!(graph.lookups, 1);
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        struct Broken;

        #[async_trait]
        impl DependencyGraph for Broken {
            async fn dependencies_of(&mut self, _id: Uuid) -> Result<Vec<Uuid>, StoreError> {
                Err(StoreError::Backend(anyhow::anyhow!("connection lost")))
            }
        }

        let [a, b] = ids();
        let result = would_create_cycle(&mut Broken, a, b).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }
}

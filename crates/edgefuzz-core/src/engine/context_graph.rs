//! Context-reachability graph: given a current `Context`, finds a sequence
//! of block-opening generators that reaches some target `Context` (§4.2).

use std::collections::{HashMap, VecDeque};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::il::Context;

use super::generators::CodeGenerator;

/// One hop: the context reached, and every generator name that can provide
/// that hop from its source context.
#[derive(Debug, Clone)]
struct Edge {
    to: Context,
    providers: Vec<&'static str>,
}

/// Directed graph over `Context` values, built once from a generator
/// catalog and reused for the engine's lifetime.
pub struct ContextGraph {
    edges: HashMap<Context, Vec<Edge>>,
}

impl ContextGraph {
    /// Builds the graph from every block-opening generator in `generators`.
    /// An edge runs from `generator.required_context` to
    /// `generator.required_context ∪ generator.opens_context`.
    pub fn build(generators: &[CodeGenerator]) -> Self {
        let mut edges: HashMap<Context, Vec<Edge>> = HashMap::new();
        for generator in generators {
            let Some(introduced) = generator.opens_context else { continue };
            let from = generator.required_context;
            let to = from.union(introduced);
            let bucket = edges.entry(from).or_default();
            match bucket.iter_mut().find(|e| e.to == to) {
                Some(edge) => edge.providers.push(generator.name),
                None => bucket.push(Edge { to, providers: vec![generator.name] }),
            }
        }
        Self { edges }
    }

    /// Breadth-first search from `src` to `dst`, ignoring cycles (each
    /// context visited at most once). Returns the ordered list of
    /// provider-name sets for each hop on a shortest path, or `None` if
    /// `dst` is unreachable from `src`.
    pub fn find_path(&self, src: Context, dst: Context) -> Option<Vec<Vec<&'static str>>> {
        if src == dst || src.contains(dst) {
            return Some(Vec::new());
        }
        let mut visited = std::collections::HashSet::new();
        visited.insert(src);
        let mut queue = VecDeque::new();
        queue.push_back((src, Vec::<Vec<&'static str>>::new()));

        while let Some((current, path)) = queue.pop_front() {
            let Some(neighbors) = self.edges.get(&current) else { continue };
            for edge in neighbors {
                if visited.contains(&edge.to) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(edge.providers.clone());
                if edge.to.contains(dst) {
                    return Some(next_path);
                }
                visited.insert(edge.to);
                queue.push_back((edge.to, next_path));
            }
        }
        None
    }

    /// Realizes a path returned by [`ContextGraph::find_path`] by choosing
    /// uniformly at random one generator name from each hop's provider set.
    pub fn realize_path(path: &[Vec<&'static str>], rng: &mut ChaCha8Rng) -> Vec<&'static str> {
        path.iter()
            .map(|providers| providers[rng.gen_range(0..providers.len())])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generators::default_generators;

    #[test]
    fn loop_context_is_reachable_from_empty() {
        let generators = default_generators();
        let graph = ContextGraph::build(&generators);
        let path = graph.find_path(Context::EMPTY, Context::LOOP).expect("loop context reachable");
        assert_eq!(path.len(), 1);
        assert!(path[0].contains(&"WhileGenerator") || path[0].contains(&"ForGenerator"));
    }

    #[test]
    fn already_satisfied_context_needs_no_hops() {
        let generators = default_generators();
        let graph = ContextGraph::build(&generators);
        assert_eq!(graph.find_path(Context::LOOP, Context::EMPTY), Some(Vec::new()));
    }

    #[test]
    fn unreachable_context_returns_none() {
        let generators = default_generators();
        let graph = ContextGraph::build(&generators);
        // No generator ever opens a context requiring WITH from JAVASCRIPT-only start.
        assert!(graph.find_path(Context::EMPTY, Context::WITH).is_none());
    }
}

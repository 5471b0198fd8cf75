//! `ContextRetriever`: bounded-BFS neighborhood expansion and similarity-seeded
//! context assembly for the RAG layer.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use thiserror::Error;

use crate::graph::Relationship;
use crate::ops::{GraphOps, OpsError, Subgraph};

/// Neighborhood expansion is capped per seed so a densely connected node
/// cannot blow up a single retrieval into the whole graph.
pub const MAX_NEIGHBORHOOD_NODES: usize = 512;

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("user does not exist")]
    UserAbsent,
    #[error("ops error: {0}")]
    Ops(String),
}

pub type RetrieveResult<T> = Result<T, RetrieveError>;

impl From<OpsError> for RetrieveError {
    fn from(err: OpsError) -> Self {
        match err {
            OpsError::UserAbsent => RetrieveError::UserAbsent,
            other => RetrieveError::Ops(other.to_string()),
        }
    }
}

pub struct ContextRetriever {
    ops: Arc<GraphOps>,
}

impl ContextRetriever {
    pub fn new(ops: Arc<GraphOps>) -> Self {
        Self { ops }
    }

    /// Bounded BFS out to `max_hops` from each seed present in the user's
    /// graph. Unknown seeds are silently omitted. Deterministic text
    /// rendering: one section per seed, one `A -[R]-> B` line per edge.
    pub async fn get_relevant_graph_context(
        &self,
        seed_names: &[String],
        user_id: &str,
        max_hops: usize,
    ) -> RetrieveResult<String> {
        let mut out = String::new();
        for seed in seed_names {
            if self.ops.get_node_data(seed, user_id).await?.is_none() {
                continue;
            }
            let (_nodes, edges) = self.bfs(seed, user_id, max_hops).await?;
            out.push_str(&format!("## {seed}\n"));
            for (source, relation, target) in &edges {
                out.push_str(&format!("{source} -[{relation}]-> {target}\n"));
            }
            out.push('\n');
        }
        Ok(out)
    }

    async fn bfs(
        &self,
        seed: &str,
        user_id: &str,
        max_hops: usize,
    ) -> RetrieveResult<(Vec<String>, Vec<(String, String, String)>)> {
        let mut hop_of: HashMap<String, usize> = HashMap::new();
        hop_of.insert(seed.to_string(), 0);
        let mut frontier = vec![seed.to_string()];
        let mut edges_seen: HashSet<(String, String, String)> = HashSet::new();
        let mut edges: Vec<(String, String, String)> = Vec::new();

        for hop in 0..max_hops {
            let mut next_frontier = Vec::new();
            for node_name in &frontier {
                let directed = self.ops.get_node_relationships(node_name, user_id).await?;
                for d in directed {
                    let rel = d.relationship;
                    let key = (rel.source.clone(), rel.relation.clone(), rel.target.clone());
                    if edges_seen.insert(key.clone()) {
                        edges.push(key);
                    }
                    for neighbor in [rel.source.clone(), rel.target.clone()] {
                        if !hop_of.contains_key(&neighbor) {
                            hop_of.insert(neighbor.clone(), hop + 1);
                            next_frontier.push(neighbor);
                        }
                    }
                }
            }
            frontier = next_frontier;
            if frontier.is_empty() {
                break;
            }
        }

        let mut nodes: Vec<(usize, String)> =
            hop_of.into_iter().map(|(name, hop)| (hop, name)).collect();
        nodes.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        nodes.truncate(MAX_NEIGHBORHOOD_NODES);
        let kept: HashSet<&str> = nodes.iter().map(|(_, n)| n.as_str()).collect();
        edges.retain(|(s, _, t)| kept.contains(s.as_str()) && kept.contains(t.as_str()));

        Ok((nodes.into_iter().map(|(_, n)| n).collect(), edges))
    }

    /// Similarity search for `query`, expand each hit's neighborhood, and
    /// format with a header naming the query.
    pub async fn get_rich_context(
        &self,
        query: &str,
        user_id: &str,
        max_hops: usize,
        top_k: usize,
    ) -> RetrieveResult<String> {
        let search = self.ops.text_similarity_search(query, user_id, top_k).await?;
        let seeds: Vec<String> = search.results.into_iter().map(|hit| hit.node_name).collect();
        let neighborhood = self.get_relevant_graph_context(&seeds, user_id, max_hops).await?;
        Ok(format!("# Context for query: {query}\n\n{neighborhood}"))
    }

    pub async fn get_ranked_subgraphs(&self, user_id: &str) -> RetrieveResult<Vec<Subgraph>> {
        Ok(self.ops.get_ranked_subgraphs(user_id).await?)
    }

    pub fn format_subgraphs_for_llm(&self, subgraphs: &[Subgraph]) -> String {
        self.ops.format_subgraphs_for_llm(subgraphs)
    }
}

/// Filters `relationships` to only those whose `source` and `target` both
/// appear in `known_names`, so ingestion never merges a dangling edge.
pub fn filter_relationships_to_known_nodes(
    relationships: Vec<Relationship>,
    known_names: &HashSet<String>,
) -> Vec<Relationship> {
    relationships
        .into_iter()
        .filter(|r| known_names.contains(&r.source) && known_names.contains(&r.target))
        .collect()
}

//! `GraphOps`: the storage facade gluing `GraphDatabase`, `VectorStore`, and
//! `Embedder` together behind a single user-scoped API. A thin struct
//! holding `Arc<dyn Trait>` collaborators, with one `thiserror` enum for its
//! own failure modes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::embed::Embedder;
use crate::generate::Generator;
use crate::graph::{DirectedEdge, Node, Relationship};
use crate::storage::{GraphDatabase, StorageError};
use crate::vector::{SimilarityHit, VectorStore};

#[derive(Debug, Error)]
pub enum OpsError {
    #[error("user does not exist")]
    UserAbsent,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("vector error: {0}")]
    Vector(#[from] crate::vector::VectorError),
    #[error("embedding error: {0}")]
    Embed(#[from] crate::embed::EmbedError),
    #[error("generation error: {0}")]
    Generate(#[from] crate::generate::GenerateError),
}

pub type OpsResult<T> = Result<T, OpsError>;

impl From<StorageError> for OpsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UserAbsent => OpsError::UserAbsent,
            other => OpsError::Storage(other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphUpdate {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilaritySearchResult {
    pub query: String,
    pub results: Vec<SimilarityHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subgraph {
    pub id: usize,
    pub nodes: Vec<String>,
    pub relationships: Vec<Relationship>,
    pub size: usize,
    pub central_nodes: Vec<String>,
}

pub struct GraphOps {
    database: Arc<dyn GraphDatabase>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl GraphOps {
    pub fn new(
        database: Arc<dyn GraphDatabase>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            database,
            vectors,
            embedder,
        }
    }

    async fn require_user(&self, user_id: &str) -> OpsResult<()> {
        if self.database.user_exists(user_id).await? {
            Ok(())
        } else {
            Err(OpsError::UserAbsent)
        }
    }

    /// Stores `nodes`, then embeds their names and writes the vectors. A node
    /// whose embedding fails is logged and left without a vector rather than
    /// failing the whole batch — the next ingestion that touches it will
    /// retry and repair it.
    pub async fn add_nodes(&self, nodes: &[Node], user_id: &str) -> OpsResult<()> {
        self.require_user(user_id).await?;
        if nodes.is_empty() {
            return Ok(());
        }
        self.database.create_nodes(nodes, user_id).await?;

        let names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
        match self.embedder.embed(&names).await {
            Ok(vectors) => {
                for (name, vector) in names.into_iter().zip(vectors.into_iter()) {
                    if let Err(err) = self.vectors.add_embedding(&name, vector, user_id).await {
                        warn!(node = %name, error = %err, "failed to index embedding, leaving node unvectored");
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "batch embedding failed, nodes left unvectored");
            }
        }
        Ok(())
    }

    pub async fn add_relationships(
        &self,
        rels: &[Relationship],
        user_id: &str,
    ) -> OpsResult<()> {
        self.require_user(user_id).await?;
        self.database.create_relationships(rels, user_id).await?;
        Ok(())
    }

    /// `add_nodes` then `add_relationships` — this order is required since
    /// relationships referencing endpoints not yet in storage are silently
    /// dropped by the storage layer.
    pub async fn update_graph(&self, update: &GraphUpdate, user_id: &str) -> OpsResult<()> {
        self.add_nodes(&update.nodes, user_id).await?;
        self.add_relationships(&update.relationships, user_id).await?;
        Ok(())
    }

    pub async fn get_node_data(&self, name: &str, user_id: &str) -> OpsResult<Option<Node>> {
        self.require_user(user_id).await?;
        Ok(self.database.get_node(name, user_id).await?)
    }

    pub async fn get_node_relationships(
        &self,
        name: &str,
        user_id: &str,
    ) -> OpsResult<Vec<DirectedEdge>> {
        self.require_user(user_id).await?;
        Ok(self.database.get_node_relationships(name, user_id).await?)
    }

    pub async fn get_all_nodes(&self, user_id: &str) -> OpsResult<Vec<Node>> {
        self.require_user(user_id).await?;
        Ok(self.database.get_all_nodes(user_id).await?)
    }

    pub async fn get_all_relationships(&self, user_id: &str) -> OpsResult<Vec<Relationship>> {
        self.require_user(user_id).await?;
        Ok(self.database.get_all_relationships(user_id).await?)
    }

    pub async fn text_similarity_search(
        &self,
        query: &str,
        user_id: &str,
        k: usize,
    ) -> OpsResult<SimilaritySearchResult> {
        self.require_user(user_id).await?;
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let vector = vectors.into_iter().next().unwrap_or_default();
        self.perform_similarity_search_with_vector(query, &vector, user_id, k)
            .await
    }

    pub async fn perform_similarity_search(
        &self,
        query: &str,
        precomputed_vec: &[f32],
        user_id: &str,
        k: usize,
    ) -> OpsResult<SimilaritySearchResult> {
        self.require_user(user_id).await?;
        self.perform_similarity_search_with_vector(query, precomputed_vec, user_id, k)
            .await
    }

    async fn perform_similarity_search_with_vector(
        &self,
        query: &str,
        vector: &[f32],
        user_id: &str,
        k: usize,
    ) -> OpsResult<SimilaritySearchResult> {
        let results = self.vectors.search_similar(vector, user_id, k).await?;
        Ok(SimilaritySearchResult {
            query: query.to_string(),
            results,
        })
    }

    /// Connected components of the user's graph, with central nodes chosen by
    /// degree within each component (ties broken by name), sorted by
    /// component size descending.
    pub async fn get_ranked_subgraphs(&self, user_id: &str) -> OpsResult<Vec<Subgraph>> {
        self.require_user(user_id).await?;
        let nodes = self.database.get_all_nodes(user_id).await?;
        let all_rels = self.database.get_all_relationships(user_id).await?;

        let mut adjacency: HashMap<&str, Vec<&Relationship>> = HashMap::new();
        for rel in &all_rels {
            adjacency.entry(rel.source.as_str()).or_default().push(rel);
            adjacency.entry(rel.target.as_str()).or_default().push(rel);
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut subgraphs = Vec::new();

        for node in &nodes {
            if visited.contains(&node.name) {
                continue;
            }
            let mut component_nodes: HashSet<String> = HashSet::new();
            let mut component_rels: Vec<Relationship> = Vec::new();
            let mut queue = VecDeque::new();
            queue.push_back(node.name.clone());
            component_nodes.insert(node.name.clone());

            while let Some(current) = queue.pop_front() {
                if let Some(rels) = adjacency.get(current.as_str()) {
                    for rel in rels {
                        component_rels.push((*rel).clone());
                        for neighbor in [rel.source.as_str(), rel.target.as_str()] {
                            if component_nodes.insert(neighbor.to_string()) {
                                queue.push_back(neighbor.to_string());
                            }
                        }
                    }
                }
            }
            component_rels.sort_by(|a, b| {
                (a.source.as_str(), a.target.as_str(), a.relation.as_str()).cmp(&(
                    b.source.as_str(),
                    b.target.as_str(),
                    b.relation.as_str(),
                ))
            });
            component_rels.dedup();

            visited.extend(component_nodes.iter().cloned());
            let central_nodes = central_nodes(&component_nodes, &component_rels);
            let mut node_names: Vec<String> = component_nodes.into_iter().collect();
            node_names.sort();

            subgraphs.push(Subgraph {
                id: subgraphs.len(),
                size: node_names.len(),
                nodes: node_names,
                relationships: component_rels,
                central_nodes,
            });
        }

        subgraphs.sort_by(|a, b| {
            b.size
                .cmp(&a.size)
                .then_with(|| a.nodes.first().cmp(&b.nodes.first()))
        });
        for (i, sg) in subgraphs.iter_mut().enumerate() {
            sg.id = i;
        }
        Ok(subgraphs)
    }

    pub fn format_subgraphs_for_llm(&self, subgraphs: &[Subgraph]) -> String {
        let mut out = String::from("# Graph Structure Analysis\n");
        for sg in subgraphs {
            out.push_str(&format!("\n## Subgraph {} (Size: {})\n", sg.id, sg.size));
            out.push_str(&format!("Central Nodes: {}\n", sg.central_nodes.join(", ")));
            out.push_str("\nNodes:\n");
            for name in &sg.nodes {
                out.push_str(&format!("- {name}\n"));
            }
            out.push_str("\nRelationships:\n");
            for rel in &sg.relationships {
                out.push_str(&format!("- {} {} {}\n", rel.source, rel.relation, rel.target));
            }
        }
        out
    }

    /// Partitions the user's graph into connected components via
    /// `get_ranked_subgraphs`, asks `generator` to cluster them into headers
    /// and subheaders, then writes `community_head`/`subheader` nodes back
    /// linked by `HAS_SUBHEADER`/`BELONGS_TO` edges. Idempotent by head name
    /// since node and edge merges are keyed on identity, not call count.
    pub async fn community_detection(
        &self,
        user_id: &str,
        generator: &dyn Generator,
        schema: &serde_json::Value,
    ) -> OpsResult<CommunityStructure> {
        self.require_user(user_id).await?;
        let subgraphs = self.get_ranked_subgraphs(user_id).await?;
        let subgraphs_text = self.format_subgraphs_for_llm(&subgraphs);

        let structure_value = generator
            .generate_structured(
                schema,
                "Identify thematic community headers and subheaders for this graph.",
                &subgraphs_text,
            )
            .await?;
        let structure: CommunityStructure = serde_json::from_value(structure_value)
            .unwrap_or(CommunityStructure { headers: Vec::new() });

        for header in &structure.headers {
            self.add_nodes(
                &[Node::new(&header.header)
                    .with_type("community_head")
                    .with_perspective(format!("Community header representing {}", header.header))],
                user_id,
            )
            .await?;

            for subheader in &header.subheaders {
                self.add_nodes(
                    &[Node::new(&subheader.subheader)
                        .with_type("subheader")
                        .with_perspective(format!("Subheader under {}", header.header))],
                    user_id,
                )
                .await?;
                self.add_relationships(
                    &[Relationship::new(&header.header, &subheader.subheader, "HAS_SUBHEADER")],
                    user_id,
                )
                .await?;

                for &subgraph_id in &subheader.subgraph_ids {
                    if let Some(sg) = subgraphs.get(subgraph_id) {
                        for central in &sg.central_nodes {
                            self.add_relationships(
                                &[Relationship::new(central, &subheader.subheader, "BELONGS_TO")],
                                user_id,
                            )
                            .await?;
                        }
                    }
                }
            }
        }

        Ok(structure)
    }
}

fn central_nodes(nodes: &HashSet<String>, rels: &[Relationship]) -> Vec<String> {
    if nodes.is_empty() {
        return Vec::new();
    }
    let mut degree: HashMap<&str, usize> = HashMap::new();
    for rel in rels {
        *degree.entry(rel.source.as_str()).or_insert(0) += 1;
        *degree.entry(rel.target.as_str()).or_insert(0) += 1;
    }
    if degree.is_empty() {
        let mut sorted: Vec<&String> = nodes.iter().collect();
        sorted.sort();
        return vec![sorted[0].clone()];
    }
    let mut entries: Vec<(&str, usize)> = degree.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    vec![entries[0].0.to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityStructure {
    #[serde(default, rename = "communityHeaders")]
    pub headers: Vec<CommunityHeader>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityHeader {
    pub header: String,
    #[serde(default)]
    pub subheaders: Vec<CommunitySubheader>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunitySubheader {
    pub subheader: String,
    #[serde(default)]
    pub subgraph_ids: Vec<usize>,
}

//! MCP tool parameter structs with schemars-derived JSON schemas.

use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UserIdParams {
    #[schemars(description = "Id of the user, matching ^[A-Za-z0-9_-]{1,128}$")]
    pub user_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IngestParams {
    #[schemars(description = "Id of the user to ingest into")]
    pub user_id: String,
    #[schemars(description = "Optional title, concatenated ahead of the content")]
    pub title: Option<String>,
    #[schemars(description = "Unstructured text content to extract nodes and relationships from")]
    pub content: String,
    #[schemars(description = "Optional key-value metadata appended as 'k: v' lines")]
    pub metadata: Option<std::collections::BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryParams {
    #[schemars(description = "Id of the user whose graph to query")]
    pub user_id: String,
    #[schemars(description = "Natural-language query")]
    pub query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AskParams {
    #[schemars(description = "Id of the user whose graph to query")]
    pub user_id: String,
    #[schemars(description = "Natural-language query")]
    pub query: String,
    #[schemars(description = "JSON schema the generator's structured answer must conform to")]
    pub output_schema: serde_json::Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CustomDataParams {
    #[schemars(description = "Id of the user to write into")]
    pub user_id: String,
    #[schemars(description = "Pre-extracted nodes to merge directly")]
    pub nodes: Vec<crate::graph::Node>,
    #[schemars(description = "Pre-extracted relationships to merge directly")]
    pub relationships: Vec<crate::graph::Relationship>,
}

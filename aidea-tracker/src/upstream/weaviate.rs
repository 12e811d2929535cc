//! Weaviate REST / GraphQL client
//!
//! Rules live in one class whose objects carry `project`, `task`, `jira` and
//! `description` text properties. Vectors are produced server-side by the
//! text2vec-ollama module, so the tracker only ever sends text.

use std::time::Duration;

use aidea_common::Rule;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{http_client, read_json, send, RuleIndex, UpstreamError, UpstreamResult, VectorSearch};
use crate::categorizer::RuleMatch;
use crate::config::WeaviateConfig;

const SERVICE: &str = "weaviate";

/// Weaviate client bound to one rule class
pub struct WeaviateClient {
    http: reqwest::Client,
    base_url: String,
    config: WeaviateConfig,
}

impl WeaviateClient {
    pub fn new(config: WeaviateConfig, timeout: Duration) -> UpstreamResult<Self> {
        Ok(Self {
            http: http_client(SERVICE, timeout)?,
            base_url: config.base_url(),
            config,
        })
    }

    pub fn class(&self) -> &str {
        &self.config.class
    }

    fn object_url(&self, id: &str) -> String {
        format!("{}/v1/objects/{}/{}", self.base_url, self.config.class, id)
    }

    /// Class definition created on first start
    fn class_definition(&self) -> Value {
        let module = |model: &str| {
            json!({
                "apiEndpoint": self.config.ollama_endpoint,
                "model": model,
            })
        };
        let text = |name: &str| json!({ "name": name, "dataType": ["text"] });

        json!({
            "class": self.config.class,
            "vectorizer": "text2vec-ollama",
            "moduleConfig": {
                "text2vec-ollama": module(&self.config.embed_model),
                "generative-ollama": module(&self.config.generative_model),
            },
            "properties": [text("project"), text("task"), text("jira"), text("description")],
        })
    }
}

/// GraphQL `Get` over `class` by concept similarity to `query`
fn near_text_query(class: &str, query: &str, limit: usize) -> String {
    // A JSON string literal is also a valid GraphQL string literal
    let concept = Value::String(query.to_string()).to_string();
    format!(
        "{{ Get {{ {class}(nearText: {{concepts: [{concept}]}}, limit: {limit}) \
         {{ project task jira description _additional {{ distance id }} }} }} }}"
    )
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RuleHit {
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    task: Option<String>,
    #[serde(default)]
    jira: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "_additional")]
    additional: Additional,
}

#[derive(Debug, Deserialize)]
struct Additional {
    distance: f64,
    id: String,
}

/// Extract rule matches for `class` from a GraphQL response body
fn parse_near_text(class: &str, body: GraphQlResponse) -> UpstreamResult<Vec<RuleMatch>> {
    if let Some(first) = body.errors.first() {
        return Err(UpstreamError::invalid(SERVICE, first.message.clone()));
    }

    let hits = body
        .data
        .as_ref()
        .and_then(|d| d.get("Get"))
        .and_then(|g| g.get(class))
        .cloned()
        .unwrap_or(Value::Array(Vec::new()));

    let hits: Vec<RuleHit> = match hits {
        Value::Null => Vec::new(),
        other => serde_json::from_value(other)
            .map_err(|e| UpstreamError::invalid(SERVICE, e.to_string()))?,
    };

    Ok(hits
        .into_iter()
        .map(|hit| RuleMatch {
            rule: Rule {
                id: hit.additional.id,
                project: hit.project.unwrap_or_default(),
                task: hit.task.unwrap_or_default(),
                jira: hit.jira.unwrap_or_default(),
                description: hit.description.unwrap_or_default(),
            },
            distance: hit.additional.distance,
        })
        .collect())
}

fn rule_properties(rule: &Rule) -> Value {
    json!({
        "project": rule.project,
        "task": rule.task,
        "jira": rule.jira,
        "description": rule.description,
    })
}

fn is_not_found(err: &UpstreamError) -> bool {
    matches!(err, UpstreamError::Status { status: 404, .. })
}

#[async_trait]
impl VectorSearch for WeaviateClient {
    async fn nearest_neighbors(&self, query: &str, limit: usize) -> UpstreamResult<Vec<RuleMatch>> {
        let url = format!("{}/v1/graphql", self.base_url);
        let body = json!({ "query": near_text_query(&self.config.class, query, limit) });

        let response = send(SERVICE, self.http.post(&url).json(&body)).await?;
        let parsed: GraphQlResponse = read_json(SERVICE, response).await?;
        let matches = parse_near_text(&self.config.class, parsed)?;

        debug!(
            class = %self.config.class,
            candidates = matches.len(),
            "nearText search complete"
        );
        Ok(matches)
    }
}

#[async_trait]
impl RuleIndex for WeaviateClient {
    async fn ensure_collection(&self) -> UpstreamResult<bool> {
        let url = format!("{}/v1/schema/{}", self.base_url, self.config.class);
        match send(SERVICE, self.http.get(&url)).await {
            Ok(_) => {
                info!(class = %self.config.class, "Rule collection already exists");
                return Ok(false);
            }
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(e),
        }

        info!(class = %self.config.class, "Rule collection not found, creating");
        let url = format!("{}/v1/schema", self.base_url);
        send(SERVICE, self.http.post(&url).json(&self.class_definition())).await?;
        Ok(true)
    }

    async fn upsert_rule(&self, rule: &Rule) -> UpstreamResult<()> {
        let object = json!({
            "class": self.config.class,
            "id": rule.id,
            "properties": rule_properties(rule),
        });

        let exists = match send(SERVICE, self.http.get(self.object_url(&rule.id))).await {
            Ok(_) => true,
            Err(e) if is_not_found(&e) => false,
            Err(e) => return Err(e),
        };

        if exists {
            send(SERVICE, self.http.patch(self.object_url(&rule.id)).json(&object)).await?;
            debug!(id = %rule.id, "Rule merged");
        } else {
            let url = format!("{}/v1/objects", self.base_url);
            send(SERVICE, self.http.post(&url).json(&object)).await?;
            debug!(id = %rule.id, "Rule created");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(value: Value) -> GraphQlResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_near_text_query_escapes_concept() {
        let query = near_text_query("ActivityRules", "fix \"quoted\" bug", 10);
        assert!(query.contains(r#"concepts: ["fix \"quoted\" bug"]"#));
        assert!(query.contains("limit: 10"));
        assert!(query.contains("_additional { distance id }"));
    }

    #[test]
    fn test_parse_hits() {
        let body = response(json!({
            "data": { "Get": { "ActivityRules": [
                {
                    "project": "IZ Gateway",
                    "task": "Development",
                    "jira": "IZG-42",
                    "description": "Xform service coding",
                    "_additional": { "distance": 0.13, "id": "5b6a1f0e-8c57-4b8d-9e3c-1a2b3c4d5e6f" }
                },
                {
                    "project": "IZ Gateway",
                    "task": "Meetings",
                    "jira": null,
                    "_additional": { "distance": 0.52, "id": "7c1d2e3f-0000-4000-8000-000000000001" }
                }
            ]}}
        }));

        let matches = parse_near_text("ActivityRules", body).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].rule.jira, "IZG-42");
        assert_eq!(matches[0].distance, 0.13);
        assert_eq!(matches[1].rule.jira, "");
        assert_eq!(matches[1].rule.description, "");
    }

    #[test]
    fn test_parse_empty_class() {
        let body = response(json!({ "data": { "Get": { "ActivityRules": null } } }));
        assert!(parse_near_text("ActivityRules", body).unwrap().is_empty());
    }

    #[test]
    fn test_graphql_errors_are_invalid_response() {
        let body = response(json!({ "errors": [{ "message": "class not found" }] }));
        let err = parse_near_text("ActivityRules", body).unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidResponse { .. }));
    }

    #[test]
    fn test_class_definition() {
        let client = WeaviateClient::new(WeaviateConfig::default(), Duration::from_secs(1)).unwrap();
        let def = client.class_definition();
        assert_eq!(def["vectorizer"], "text2vec-ollama");
        assert_eq!(def["moduleConfig"]["text2vec-ollama"]["model"], "all-minilm");
        assert_eq!(def["properties"].as_array().unwrap().len(), 4);
    }
}

//! Remote backend against Neo4j's HTTP transactional Cypher endpoint.
//!
//! Candidate search delegates to a full-text index; path search uses the
//! native `shortestPath` traversal restricted to the three SKOS relation
//! types, post-filtered by per-node degree against the hub threshold.
//!
//! Requests go over blocking JSON HTTP, the same transport style as the
//! Ollama client. An unreachable server surfaces as
//! [`BackendError::Unavailable`]; the engine never swaps backends
//! mid-request.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use crate::error::BackendError;
use crate::model::{Candidate, Health, Path, PathStep};

use super::GraphBackend;

/// Connection settings for the remote backend.
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    /// HTTP base URI, e.g. `http://localhost:7474`.
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Database name; the server default when `None`.
    pub database: Option<String>,
    /// Full-text index over concept labels.
    pub fulltext_index: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Neo4jConfig {
    /// Build a config from `NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASSWORD`,
    /// `NEO4J_DATABASE`, and `NEO4J_FULLTEXT_INDEX`.
    ///
    /// Returns `None` when the required credentials are absent; callers use
    /// that to select the in-memory fallback at construction time.
    pub fn from_env() -> Option<Self> {
        let uri = std::env::var("NEO4J_URI").ok()?;
        let user = std::env::var("NEO4J_USER").ok()?;
        let password = std::env::var("NEO4J_PASSWORD").ok()?;
        Some(Self {
            uri,
            user,
            password,
            database: std::env::var("NEO4J_DATABASE").ok(),
            fulltext_index: std::env::var("NEO4J_FULLTEXT_INDEX")
                .unwrap_or_else(|_| "skos_fulltext".into()),
            timeout_secs: 30,
        })
    }
}

/// [`GraphBackend`] over the Neo4j HTTP API.
pub struct Neo4jBackend {
    config: Neo4jConfig,
    agent: ureq::Agent,
    endpoint: String,
    auth_header: String,
}

impl Neo4jBackend {
    pub fn new(config: Neo4jConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        let database = config.database.as_deref().unwrap_or("neo4j");
        let endpoint = format!("{}/db/{}/tx/commit", config.uri.trim_end_matches('/'), database);
        let auth_header = format!(
            "Basic {}",
            BASE64.encode(format!("{}:{}", config.user, config.password))
        );
        Self {
            config,
            agent,
            endpoint,
            auth_header,
        }
    }

    /// Run one Cypher statement and return its result rows.
    fn run(&self, statement: &str, parameters: Value) -> Result<Vec<Value>, BackendError> {
        let body = json!({
            "statements": [{ "statement": statement, "parameters": parameters }]
        });

        let resp = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .set("Authorization", &self.auth_header)
            .send_string(&body.to_string())
            .map_err(|e: ureq::Error| match e {
                ureq::Error::Transport(t) => BackendError::Unavailable {
                    url: self.config.uri.clone(),
                    message: t.to_string(),
                },
                ureq::Error::Status(code, _) => BackendError::QueryFailed {
                    message: format!("server returned status {code}"),
                },
            })?;

        let payload: Value = resp
            .into_json()
            .map_err(|e| BackendError::MalformedResponse {
                message: e.to_string(),
            })?;

        if let Some(err) = payload["errors"].as_array().and_then(|a| a.first()) {
            return Err(BackendError::QueryFailed {
                message: format!(
                    "{}: {}",
                    err["code"].as_str().unwrap_or("unknown"),
                    err["message"].as_str().unwrap_or("")
                ),
            });
        }

        let rows = payload["results"][0]["data"]
            .as_array()
            .ok_or_else(|| BackendError::MalformedResponse {
                message: "missing results[0].data".into(),
            })?
            .iter()
            .map(|d| d["row"].clone())
            .collect();
        Ok(rows)
    }
}

impl GraphBackend for Neo4jBackend {
    fn search_candidates(&self, surface: &str, limit: usize) -> Result<Vec<Candidate>, BackendError> {
        let statement = "\
            CALL db.index.fulltext.queryNodes($index, $term) YIELD node, score \
            RETURN coalesce(node.uri, node.iri, toString(id(node))) AS iri, \
                   coalesce(node.prefLabel, node.altLabel, node.label, []) AS labels, \
                   score \
            ORDER BY score DESC \
            LIMIT $limit";
        let rows = self.run(
            statement,
            json!({
                "index": self.config.fulltext_index,
                "term": surface,
                "limit": limit,
            }),
        )?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let iri = row[0]
                .as_str()
                .ok_or_else(|| BackendError::MalformedResponse {
                    message: "candidate row missing iri".into(),
                })?
                .to_string();
            let label = first_label(&row[1]).unwrap_or_else(|| surface.to_string());
            candidates.push(Candidate {
                iri,
                label,
                score: row[2].as_f64(),
            });
        }
        Ok(candidates)
    }

    fn shortest_path(
        &self,
        source_iri: &str,
        target_iri: &str,
        max_hops: usize,
        hub_threshold: Option<usize>,
    ) -> Result<Option<Path>, BackendError> {
        if source_iri == target_iri {
            return Ok(None);
        }
        let hops = max_hops.max(1);
        // The variable-length bound cannot be parameterized in Cypher.
        let statement = format!(
            "MATCH (source {{uri: $source_iri}}) \
             MATCH (target {{uri: $target_iri}}) \
             MATCH p=shortestPath((source)-[:broader|narrower|related*..{hops}]-(target)) \
             WITH p, nodes(p) AS ns, relationships(p) AS rels \
             UNWIND ns AS node \
             WITH p, ns, rels, node, COUNT {{ (node)-[]-() }} AS node_degree \
             WITH p, ns, rels, collect(node_degree) AS degrees \
             WHERE $hub_threshold IS NULL OR ALL(deg IN degrees WHERE deg <= $hub_threshold) \
             RETURN [n IN ns | [coalesce(n.uri, n.iri, toString(id(n))), \
                                coalesce(n.prefLabel, n.altLabel, n.label, null)]] AS nodes, \
                    [r IN rels | type(r)] AS rels \
             LIMIT 1"
        );
        let rows = self.run(
            &statement,
            json!({
                "source_iri": source_iri,
                "target_iri": target_iri,
                "hub_threshold": hub_threshold,
            }),
        )?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let nodes = row[0]
            .as_array()
            .ok_or_else(|| BackendError::MalformedResponse {
                message: "path row missing nodes".into(),
            })?;
        let rels = row[1]
            .as_array()
            .ok_or_else(|| BackendError::MalformedResponse {
                message: "path row missing relationships".into(),
            })?;
        if nodes.len() != rels.len() + 1 {
            return Err(BackendError::MalformedResponse {
                message: format!("{} nodes for {} relationships", nodes.len(), rels.len()),
            });
        }

        let mut steps = Vec::with_capacity(rels.len());
        for (i, rel) in rels.iter().enumerate() {
            steps.push(PathStep {
                subject_iri: node_iri(&nodes[i])?,
                subject_label: first_label(&nodes[i][1]),
                predicate: rel.as_str().unwrap_or("related").to_string(),
                object_iri: node_iri(&nodes[i + 1])?,
                object_label: first_label(&nodes[i + 1][1]),
            });
        }
        Ok(Some(steps))
    }

    fn health(&self) -> Health {
        match self.run("RETURN 1 AS ok", json!({})) {
            Ok(rows) if rows.first().map(|r| r[0].as_i64()) == Some(Some(1)) => Health::Ok,
            Ok(_) => Health::Degraded("health query returned unexpected result".into()),
            Err(BackendError::Unavailable { message, .. }) => Health::Unavailable(message),
            Err(e) => Health::Degraded(e.to_string()),
        }
    }
}

impl std::fmt::Debug for Neo4jBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jBackend")
            .field("uri", &self.config.uri)
            .field("database", &self.config.database)
            .field("fulltext_index", &self.config.fulltext_index)
            .finish()
    }
}

fn node_iri(node: &Value) -> Result<String, BackendError> {
    node[0]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| BackendError::MalformedResponse {
            message: "path node missing iri".into(),
        })
}

/// SKOS label properties may hold a single string or a language list; take
/// the first entry either way.
fn first_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|v| v.as_str().map(|s| s.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serve exactly one HTTP request with a canned JSON body, handing the
    /// captured request body back through the channel.
    fn serve_once(response_body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
                if line == "\r\n" {
                    break;
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            tx.send(String::from_utf8(body).unwrap()).unwrap();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                response_body.len(),
                response_body
            );
            stream.write_all(response.as_bytes()).unwrap();
        });
        (format!("http://{addr}"), rx)
    }

    fn backend_at(uri: String) -> Neo4jBackend {
        Neo4jBackend::new(Neo4jConfig {
            uri,
            user: "neo4j".into(),
            password: "secret".into(),
            database: None,
            fulltext_index: "skos_fulltext".into(),
            timeout_secs: 5,
        })
    }

    #[test]
    fn hub_threshold_is_sent_and_filtered_paths_are_absent() {
        // The degree filter runs server-side; a hub-routed path comes back as
        // zero rows. The client must pass the threshold through and report
        // the suppressed path as absent, not as an error.
        let (uri, requests) = serve_once(
            r#"{"results":[{"columns":["nodes","rels"],"data":[]}],"errors":[]}"#,
        );
        let backend = backend_at(uri);

        let result = backend.shortest_path("ex:a", "ex:b", 2, Some(50)).unwrap();
        assert!(result.is_none());

        let body: Value = serde_json::from_str(&requests.recv().unwrap()).unwrap();
        let statement = &body["statements"][0];
        assert_eq!(statement["parameters"]["hub_threshold"], json!(50));
        assert_eq!(statement["parameters"]["source_iri"], json!("ex:a"));
        assert_eq!(statement["parameters"]["target_iri"], json!("ex:b"));
        let cypher = statement["statement"].as_str().unwrap();
        assert!(cypher.contains("deg <= $hub_threshold"));
        assert!(cypher.contains("*..2"));
    }

    #[test]
    fn absent_hub_threshold_is_sent_as_null() {
        let (uri, requests) = serve_once(
            r#"{"results":[{"columns":["nodes","rels"],"data":[]}],"errors":[]}"#,
        );
        let backend = backend_at(uri);

        backend.shortest_path("ex:a", "ex:b", 3, None).unwrap();

        let body: Value = serde_json::from_str(&requests.recv().unwrap()).unwrap();
        assert_eq!(body["statements"][0]["parameters"]["hub_threshold"], json!(null));
    }

    #[test]
    fn path_rows_parse_into_adjacency_steps() {
        let (uri, _requests) = serve_once(
            r#"{"results":[{"columns":["nodes","rels"],"data":[
                {"row":[[["ex:a","Alpha"],["ex:b",["Beta","B"]],["ex:c",null]],
                        ["related","broader"]]}
            ]}],"errors":[]}"#,
        );
        let backend = backend_at(uri);

        let path = backend
            .shortest_path("ex:a", "ex:c", 2, Some(10))
            .unwrap()
            .expect("path row present");
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].subject_iri, "ex:a");
        assert_eq!(path[0].subject_label.as_deref(), Some("Alpha"));
        assert_eq!(path[0].predicate, "related");
        assert_eq!(path[0].object_iri, "ex:b");
        assert_eq!(path[0].object_label.as_deref(), Some("Beta"));
        assert_eq!(path[1].predicate, "broader");
        assert_eq!(path[1].object_iri, "ex:c");
        assert!(path[1].object_label.is_none());
        // Adjacency chain invariant.
        assert_eq!(path[0].object_iri, path[1].subject_iri);
    }

    #[test]
    fn server_reported_error_surfaces_as_query_failed() {
        let (uri, _requests) = serve_once(
            r#"{"results":[],"errors":[{"code":"Neo.ClientError.Schema.IndexNotFound","message":"no such index"}]}"#,
        );
        let backend = backend_at(uri);

        let result = backend.search_candidates("graph", 5);
        match result {
            Err(BackendError::QueryFailed { message }) => {
                assert!(message.contains("IndexNotFound"));
                assert!(message.contains("no such index"));
            }
            other => panic!("expected QueryFailed, got {other:?}"),
        }
    }

    fn unreachable_backend() -> Neo4jBackend {
        Neo4jBackend::new(Neo4jConfig {
            uri: "http://127.0.0.1:1".into(),
            user: "neo4j".into(),
            password: "secret".into(),
            database: None,
            fulltext_index: "skos_fulltext".into(),
            timeout_secs: 1,
        })
    }

    #[test]
    fn unreachable_server_surfaces_unavailable() {
        let backend = unreachable_backend();
        let result = backend.search_candidates("graph", 5);
        assert!(matches!(result, Err(BackendError::Unavailable { .. })));
    }

    #[test]
    fn unreachable_server_health_reports_not_raises() {
        let backend = unreachable_backend();
        assert!(matches!(backend.health(), Health::Unavailable(_)));
    }

    #[test]
    fn identical_endpoints_short_circuit_without_io() {
        let backend = unreachable_backend();
        let result = backend.shortest_path("ex:a", "ex:a", 2, None).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn first_label_handles_string_and_list() {
        assert_eq!(first_label(&json!("Graph Theory")), Some("Graph Theory".into()));
        assert_eq!(
            first_label(&json!(["Graphentheorie", "Graph Theory"])),
            Some("Graphentheorie".into())
        );
        assert_eq!(first_label(&json!(null)), None);
        assert_eq!(first_label(&json!([])), None);
    }

    #[test]
    fn endpoint_includes_database() {
        let mut config = Neo4jConfig {
            uri: "http://localhost:7474/".into(),
            user: "u".into(),
            password: "p".into(),
            database: Some("skos".into()),
            fulltext_index: "skos_fulltext".into(),
            timeout_secs: 1,
        };
        let backend = Neo4jBackend::new(config.clone());
        assert_eq!(backend.endpoint, "http://localhost:7474/db/skos/tx/commit");

        config.database = None;
        let backend = Neo4jBackend::new(config);
        assert_eq!(backend.endpoint, "http://localhost:7474/db/neo4j/tx/commit");
    }
}

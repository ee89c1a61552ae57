//! JSON-RPC session tests over an in-memory transport.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use agentlog::mcp::{INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR, RpcServer};
use agentlog::{AgentlogConfig, FixedProbe, MonitorService};
use serde_json::{Value, json};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

fn server(data: &TempDir) -> RpcServer {
    let config = AgentlogConfig::new().with_data_root(data.path());
    let service = MonitorService::with_probe(config, Arc::new(FixedProbe(0.0))).unwrap();
    RpcServer::new(Arc::new(service))
}

fn session(server: &RpcServer, requests: &[Value]) -> Vec<Value> {
    let input: String = requests.iter().map(|r| format!("{r}\n")).collect();
    let mut output = Vec::new();
    server.serve(Cursor::new(input), &mut output).unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn request(id: u64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

#[test]
fn test_resolve_append_and_read_session() {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let root = work.path().join("project");
    std::fs::create_dir_all(root.join(".git")).unwrap();
    std::fs::create_dir_all(root.join("src")).unwrap();
    let server = server(&data);

    let resolved = session(
        &server,
        &[request(1, "repos/resolve", json!({ "path": root.join("src") }))],
    );
    let repo_id = resolved[0]["result"]["repo_id"].as_str().unwrap().to_string();

    let responses = session(
        &server,
        &[
            request(2, "initialize", json!({})),
            request(
                3,
                "memory/append",
                json!({ "repo_id": repo_id, "kind": "decision", "text": "use sqlite for the cache" }),
            ),
            request(
                4,
                "tools/call",
                json!({
                    "name": "add_memory",
                    "arguments": { "repo_id": repo_id, "kind": "failure", "text": "tests failed: 3 errors" }
                }),
            ),
            request(5, "state/write", json!({ "repo_id": repo_id, "state": { "step": 2 } })),
            request(6, "memory/read", json!({ "repo_id": repo_id })),
            request(7, "repos/list", json!({})),
            request(
                8,
                "resources/read",
                json!({ "uri": format!("memory://{repo_id}/signatures") }),
            ),
        ],
    );
    assert_eq!(responses.len(), 7);
    for (response, id) in responses.iter().zip(2..) {
        assert_eq!(response["id"], json!(id));
        assert!(response.get("error").is_none(), "{response}");
    }

    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "agentlog");
    assert_eq!(responses[2]["result"]["isError"], json!(false));

    let memory = &responses[4]["result"];
    assert!(
        memory["decisions"]
            .as_str()
            .unwrap()
            .contains("use sqlite for the cache")
    );
    assert!(
        memory["failures"]
            .as_str()
            .unwrap()
            .contains("tests failed: 3 errors")
    );
    assert_eq!(memory["state"], json!({ "step": 2 }));
    assert_eq!(memory["signatures"], json!(["tests failed: 3 errors"]));

    let repos = responses[5]["result"]["repos"].as_array().unwrap();
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0]["id"], json!(repo_id));

    let text = responses[6]["result"]["contents"][0]["text"].as_str().unwrap();
    assert!(text.contains("tests failed: 3 errors"));
}

#[test]
fn test_protocol_errors() {
    let data = TempDir::new().unwrap();
    let server = server(&data);

    let mut output = Vec::new();
    let input = "not json\n\n{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n";
    server.serve(Cursor::new(input), &mut output).unwrap();
    let responses: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["error"]["code"], json!(PARSE_ERROR));

    let responses = session(
        &server,
        &[
            request(1, "memory/teleport", json!({})),
            request(2, "memory/read", json!({ "repo_id": "../etc" })),
            request(3, "memory/append", json!({ "repo_id": "abc", "kind": "musing", "text": "x" })),
        ],
    );
    assert_eq!(responses[0]["error"]["code"], json!(METHOD_NOT_FOUND));
    assert_eq!(responses[1]["error"]["code"], json!(INVALID_PARAMS));
    assert_eq!(responses[2]["error"]["code"], json!(INVALID_PARAMS));
}

#[test]
fn test_status_before_any_activity() {
    let data = TempDir::new().unwrap();
    let server = server(&data);

    let responses = session(
        &server,
        &[
            request(1, "status", json!({})),
            request(2, "watcher/stop", json!({})),
        ],
    );
    assert_eq!(responses[0]["result"]["running"], json!(false));
    assert_eq!(responses[0]["result"]["activity"], Value::Null);
    assert_eq!(responses[1]["result"]["status"], json!("not running"));
}

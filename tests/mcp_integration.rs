//! Integration tests for MCP protocol handling.
//!
//! These tests verify the server's JSON-RPC 2.0 protocol implementation,
//! including request/response handling, error responses, and lifecycle
//! management, by driving whole sessions over in-memory transports.

use document_mcp::documents::{document_registry, DocumentStore, MemoryStore};
use document_mcp::error::ServerError;
use document_mcp::mcp::messages::ServerInfo;
use document_mcp::mcp::protocol::{parse_message, IncomingMessage, RequestId};
use document_mcp::mcp::{Dispatcher, LineTransport, ProtocolError, Session, SessionState};
use serde_json::{json, Value};

// =============================================================================
// Helpers
// =============================================================================

fn dispatcher() -> Dispatcher {
    Dispatcher::new(
        document_registry().unwrap(),
        Box::new(MemoryStore::seeded()),
        ServerInfo::default(),
    )
}

fn request(id: i64, method: &str, params: Value) -> String {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}).to_string()
}

fn initialize(id: i64) -> String {
    request(
        id,
        "initialize",
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "1.0.0"}
        }),
    )
}

fn call_tool(id: i64, name: &str, arguments: Value) -> String {
    request(id, "tools/call", json!({"name": name, "arguments": arguments}))
}

/// Runs a whole session over the given frames and returns every reply.
async fn run_session(frames: &[String]) -> (Result<(), ServerError>, Vec<Value>, Dispatcher) {
    let input = frames.iter().map(|f| format!("{f}\n")).collect::<String>();
    let mut session = Session::new(
        LineTransport::new(input.as_bytes(), Vec::new()),
        dispatcher(),
    );
    let result = session.run().await;
    assert_eq!(session.dispatcher().state(), SessionState::Closed);

    let fatal = session.dispatcher().fatal_error().cloned();
    let (_, written) = session.into_transport().into_parts();
    let replies = String::from_utf8(written)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    // Replaying the frames directly exposes the store afterwards.
    let mut replay = dispatcher();
    for frame in frames {
        replay.handle_frame(frame);
    }
    assert_eq!(replay.fatal_error().cloned(), fatal);

    (result, replies, replay)
}

// =============================================================================
// Protocol Parsing Tests
// =============================================================================

#[test]
fn test_parse_initialize_request() {
    let result = parse_message(&initialize(1));
    assert!(result.is_ok());

    if let IncomingMessage::Request(req) = result.unwrap() {
        assert_eq!(req.method, "initialize");
        assert_eq!(req.id, RequestId::Number(1));
    } else {
        panic!("Expected Request");
    }
}

#[test]
fn test_parse_string_id_request() {
    let json = r#"{"jsonrpc": "2.0", "id": "abc", "method": "tools/list"}"#;

    if let IncomingMessage::Request(req) = parse_message(json).unwrap() {
        assert_eq!(req.id, RequestId::String("abc".to_string()));
        assert!(req.params.is_none());
    } else {
        panic!("Expected Request");
    }
}

#[test]
fn test_parse_notification() {
    let json = r#"{
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Notification(notif) = result.unwrap() {
        assert_eq!(notif.method, "notifications/initialized");
    } else {
        panic!("Expected Notification");
    }
}

#[test]
fn test_parse_invalid_json() {
    let result = parse_message("not valid json");
    assert!(matches!(result, Err(ProtocolError::Parse { .. })));
}

#[test]
fn test_parse_wrong_version() {
    let json = r#"{"jsonrpc": "1.0", "id": 1, "method": "ping"}"#;
    let result = parse_message(json);
    assert!(matches!(result, Err(ProtocolError::InvalidMessage { .. })));
}

// =============================================================================
// Session Tests
// =============================================================================

#[tokio::test]
async fn test_discovery_after_handshake() {
    let frames = [
        initialize(1),
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#.to_string(),
        request(2, "tools/list", json!({})),
        request(3, "resources/list", json!({})),
        request(4, "prompts/list", json!({})),
    ];
    let (result, replies, _) = run_session(&frames).await;
    assert!(result.is_ok());
    assert_eq!(replies.len(), 4);

    let init = &replies[0]["result"];
    assert_eq!(init["serverInfo"]["name"], "DocumentMCP");
    assert_eq!(init["protocolVersion"], "2024-11-05");

    let tools: Vec<&str> = replies[1]["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(tools, ["read_doc_contents", "edit_document"]);

    assert_eq!(replies[2]["result"]["resources"][0]["uri"], "docs://documents");

    let prompts: Vec<&str> = replies[3]["result"]["prompts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(prompts, ["format", "summarize"]);
}

#[tokio::test]
async fn test_read_document() {
    let frames = [
        initialize(1),
        call_tool(2, "read_doc_contents", json!({"doc_id": "plan.md"})),
    ];
    let (_, replies, _) = run_session(&frames).await;

    assert_eq!(
        replies[1]["result"]["content"][0]["text"],
        "The plan outlines the steps for the project's implementation."
    );
}

#[tokio::test]
async fn test_missing_document_is_not_fatal() {
    let frames = [
        initialize(1),
        call_tool(2, "read_doc_contents", json!({"doc_id": "missing.md"})),
        call_tool(3, "read_doc_contents", json!({"doc_id": "spec.txt"})),
    ];
    let (result, replies, _) = run_session(&frames).await;
    assert!(result.is_ok());
    assert_eq!(replies.len(), 3);

    let error = &replies[1]["error"];
    assert!(error["message"]
        .as_str()
        .unwrap()
        .ends_with("Doc with id missing.md not found"));
    assert_eq!(error["data"]["kind"], "ToolExecutionError");
    assert!(replies[1].get("result").is_none());

    assert!(replies[2]["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("technical requirements"));
}

#[tokio::test]
async fn test_edit_replaces_all_occurrences() {
    let frames = [
        initialize(1),
        call_tool(
            2,
            "edit_document",
            json!({"doc_id": "outlook.pdf", "old_str": "the", "new_str": "THE"}),
        ),
        call_tool(3, "read_doc_contents", json!({"doc_id": "outlook.pdf"})),
    ];
    let (_, replies, replay) = run_session(&frames).await;

    assert_eq!(replies[1]["result"]["content"], json!([]));
    let expected = "This document presents THE projected future performance of THE system.";
    assert_eq!(replies[2]["result"]["content"][0]["text"], expected);
    assert_eq!(replay.store().get("outlook.pdf").unwrap(), expected);
}

#[tokio::test]
async fn test_invalid_arguments_never_reach_handler() {
    let frames = [
        initialize(1),
        call_tool(2, "edit_document", json!({"doc_id": "plan.md", "old_str": "plan"})),
        call_tool(3, "read_doc_contents", json!({"doc_id": 42})),
    ];
    let (_, replies, replay) = run_session(&frames).await;

    let data = &replies[1]["error"]["data"];
    assert_eq!(data["kind"], "InvalidArguments");
    assert_eq!(data["fields"][0]["field"], "new_str");
    assert_eq!(data["fields"][0]["error"], "MissingRequired");

    let data = &replies[2]["error"]["data"];
    assert_eq!(data["fields"][0]["error"], "TypeMismatch");
    assert_eq!(data["fields"][0]["expected"], "string");
    assert_eq!(data["fields"][0]["found"], "number");

    assert_eq!(
        replay.store().get("plan.md").unwrap(),
        "The plan outlines the steps for the project's implementation."
    );
}

#[tokio::test]
async fn test_read_resources() {
    let frames = [
        initialize(1),
        request(2, "resources/read", json!({"uri": "docs://documents"})),
        request(3, "resources/read", json!({"uri": "docs://documents/report.pdf"})),
        request(4, "resources/read", json!({"uri": "docs://documents/nope.md"})),
        request(5, "resources/read", json!({"uri": "docs://other"})),
    ];
    let (_, replies, _) = run_session(&frames).await;

    let list = &replies[1]["result"]["contents"][0];
    assert_eq!(list["mimeType"], "application/json");
    let ids: Vec<String> = serde_json::from_str(list["text"].as_str().unwrap()).unwrap();
    assert_eq!(
        ids,
        [
            "deposition.md",
            "report.pdf",
            "financials.docx",
            "outlook.pdf",
            "plan.md",
            "spec.txt"
        ]
    );

    assert_eq!(
        replies[2]["result"]["contents"][0]["text"],
        "The report details the state of a 20m condenser tower."
    );

    assert_eq!(replies[3]["error"]["data"]["cause"], "DocumentNotFound");
    assert_eq!(replies[4]["error"]["code"], -32002);
}

#[tokio::test]
async fn test_prompt_expansion() {
    let frames = [
        initialize(1),
        request(
            2,
            "prompts/get",
            json!({"name": "summarize", "arguments": {"doc_id": "financials.docx"}}),
        ),
    ];
    let (_, replies, _) = run_session(&frames).await;

    let message = &replies[1]["result"]["messages"][0];
    assert_eq!(message["role"], "user");
    let text = message["content"]["text"].as_str().unwrap();
    assert!(text.contains("financials.docx"));
    assert!(text.contains("read_doc_contents"));
}

#[tokio::test]
async fn test_request_before_initialize_closes_session() {
    let frames = [request(1, "tools/list", json!({})), initialize(2)];
    let (result, replies, _) = run_session(&frames).await;

    assert!(matches!(
        result,
        Err(ServerError::Protocol(ProtocolError::NotInitialized { .. }))
    ));
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["id"], 1);
    assert_eq!(replies[0]["error"]["data"]["kind"], "NotInitialized");
}

#[tokio::test]
async fn test_malformed_frame_closes_session() {
    let frames = [
        initialize(1),
        "{\"jsonrpc\": \"2.0\", \"id\": ".to_string(),
        request(2, "ping", json!({})),
    ];
    let (result, replies, _) = run_session(&frames).await;

    assert!(matches!(
        result,
        Err(ServerError::Protocol(ProtocolError::Parse { .. }))
    ));
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[1]["error"]["code"], -32700);
    assert_eq!(replies[1]["id"], Value::Null);
}

#[tokio::test]
async fn test_non_utf8_frame_closes_session() {
    let mut input = format!("{}\n", initialize(1)).into_bytes();
    input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"\xc3\x28\"}\n");
    input.extend_from_slice(format!("{}\n", request(3, "ping", json!({}))).as_bytes());

    let mut session = Session::new(LineTransport::new(&input[..], Vec::new()), dispatcher());
    let result = session.run().await;
    assert!(matches!(
        result,
        Err(ServerError::Protocol(ProtocolError::Parse { .. }))
    ));

    let (_, written) = session.into_transport().into_parts();
    let replies: Vec<Value> = String::from_utf8(written)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[1]["error"]["code"], -32700);
    assert_eq!(replies[1]["id"], Value::Null);
}

#[tokio::test]
async fn test_responses_follow_request_order() {
    let frames: Vec<String> = std::iter::once(initialize(0))
        .chain((1..=20).map(|id| request(id, "ping", json!({}))))
        .collect();
    let (_, replies, _) = run_session(&frames).await;

    let ids: Vec<i64> = replies.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, (0..=20).collect::<Vec<_>>());
}

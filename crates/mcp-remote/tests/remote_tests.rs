//! Integration tests for mcp-remote, driven against a mock Python
//! subprocess speaking the JSONL JSON-RPC wire format.

use mcp_remote::{RemoteBackend, RemoteSpec};
use std::collections::BTreeMap;
use std::path::PathBuf;

fn mock_script_path() -> String {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("mock_remote.py")
        .to_string_lossy()
        .into_owned()
}

fn python_cmd() -> Option<String> {
    for cmd in &["python3", "python"] {
        if std::process::Command::new(cmd)
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok()
        {
            return Some((*cmd).to_string());
        }
    }
    None
}

fn spec_with_args(args: Vec<String>, token_cache_dir: PathBuf) -> RemoteSpec {
    RemoteSpec {
        command: python_cmd().expect("python required for this test"),
        args,
        cwd: None,
        extra_env: BTreeMap::new(),
        default_url: Some("https://example.com/mcp".into()),
        token_cache_dir,
    }
}

#[tokio::test]
async fn connect_lists_tools() {
    if python_cmd().is_none() {
        eprintln!("SKIP: python not found");
        return;
    }
    let token_cache_dir = tempfile::tempdir().unwrap();
    let backend = RemoteBackend::new(spec_with_args(
        vec![mock_script_path()],
        token_cache_dir.path().to_path_buf(),
    ));

    backend.connect().await.expect("connect should succeed");
    let tools = backend.tools().await;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo");
}

#[tokio::test]
async fn call_tool_round_trips() {
    if python_cmd().is_none() {
        eprintln!("SKIP: python not found");
        return;
    }
    let token_cache_dir = tempfile::tempdir().unwrap();
    let backend = RemoteBackend::new(spec_with_args(
        vec![mock_script_path()],
        token_cache_dir.path().to_path_buf(),
    ));
    backend.connect().await.unwrap();

    let result = backend
        .call_tool("echo", serde_json::json!({"hello": "world"}))
        .await
        .expect("call should succeed");
    assert!(!result.is_error);
}

#[tokio::test]
async fn call_tool_reconnects_once_after_crash() {
    if python_cmd().is_none() {
        eprintln!("SKIP: python not found");
        return;
    }
    let token_cache_dir = tempfile::tempdir().unwrap();
    let state_dir = tempfile::tempdir().unwrap();
    let state_file = state_dir.path().join("crashed-once");

    let backend = RemoteBackend::new(spec_with_args(
        vec![mock_script_path(), state_file.to_string_lossy().into_owned()],
        token_cache_dir.path().to_path_buf(),
    ));
    backend.connect().await.unwrap();

    // First call crashes the child; the backend must transparently
    // reconnect and retry exactly once, succeeding on the second attempt.
    let result = backend
        .call_tool("crash-once", serde_json::json!({}))
        .await
        .expect("call should recover via single reconnect+retry");
    assert!(!result.is_error);
    assert!(state_file.exists());
}

#[tokio::test]
async fn spawn_invalid_command_returns_error() {
    let token_cache_dir = tempfile::tempdir().unwrap();
    let backend = RemoteBackend::new(RemoteSpec {
        command: "nonexistent-binary-xyz-123".into(),
        args: vec![],
        cwd: None,
        extra_env: BTreeMap::new(),
        default_url: None,
        token_cache_dir: token_cache_dir.path().to_path_buf(),
    });
    let result = backend.connect().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn reauth_evicts_tokens_and_reconnects() {
    if python_cmd().is_none() {
        eprintln!("SKIP: python not found");
        return;
    }
    let token_cache_dir = tempfile::tempdir().unwrap();
    let url = "https://example.com/mcp";
    let hash = mcp_remote::md5_hex(url);
    let versioned = token_cache_dir.path().join("mcp-remote-1.0");
    std::fs::create_dir_all(&versioned).unwrap();
    std::fs::write(versioned.join(format!("{hash}_tokens.json")), "{}").unwrap();

    let backend = RemoteBackend::new(spec_with_args(
        vec![mock_script_path()],
        token_cache_dir.path().to_path_buf(),
    ));
    backend.connect().await.unwrap();

    let summary = backend.reauth().await;
    assert_eq!(summary.status, "reauth_triggered");
    assert_eq!(summary.deleted_files, 1);
    assert!(backend.is_connected().await);
}

/// Extract the remote URL the child process was launched against
/// (spec.md §4.5 "URL extraction").
///
/// `node <url> ...` uses `argv[1]`; `npx ... mcp-remote <url> ...` uses the
/// token immediately following `"mcp-remote"`; anything else falls back to
/// `configured_default`.
#[must_use]
pub fn extract_remote_url(
    command: &str,
    argv: &[String],
    configured_default: Option<&str>,
) -> Option<String> {
    match command {
        "node" if argv.len() >= 2 => Some(argv[1].clone()),
        "npx" => argv
            .iter()
            .position(|a| a == "mcp-remote")
            .and_then(|i| argv.get(i + 1))
            .cloned()
            .or_else(|| configured_default.map(str::to_string)),
        _ => configured_default.map(str::to_string),
    }
}

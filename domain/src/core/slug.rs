//! Identifier slugging for disambiguated tool names.

/// Slug a provider display name into an identifier segment.
///
/// Lowercases, maps every run of non-alphanumeric characters to a single
/// underscore, and trims leading/trailing underscores. "GitHub MCP" and
/// "github-mcp" both slug to `github_mcp`, so the derived tool name is
/// stable across cosmetic renames.
pub fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_separator = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    out
}

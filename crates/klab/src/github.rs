//! Minimal GitHub REST client for the auxiliary release tooling.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

/// Repository every request targets.
pub const GITHUB_REPO_ID: &str = "klab-harness/klab";

/// One API request. `path` is appended to the repository URL; `subdomain`
/// selects the API host (`api` for REST, `uploads` for release assets).
pub struct GithubRequest<'a> {
    pub path: &'a str,
    pub subdomain: &'a str,
    pub url_params: &'a [(&'a str, &'a str)],
    pub authenticate: bool,
}

impl Default for GithubRequest<'_> {
    fn default() -> Self {
        GithubRequest {
            path: "",
            subdomain: "api",
            url_params: &[],
            authenticate: false,
        }
    }
}

/// GET against the repository API and parse the JSON body; an empty body
/// parses as an empty object. Authentication reads the token file and sends
/// it as a `token` Authorization header.
pub fn make_request(token_file: &Path, req: &GithubRequest<'_>) -> Result<Value> {
    let mut url = format!(
        "https://{}.github.com/repos/{}{}",
        req.subdomain, GITHUB_REPO_ID, req.path
    );
    if !req.url_params.is_empty() {
        let query: Vec<String> = req
            .url_params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
            .collect();
        url.push('?');
        url.push_str(&query.join("&"));
    }

    let mut call = ureq::get(&url).header("Accept", "application/vnd.github.v3+json");
    if req.authenticate {
        let token = std::fs::read_to_string(token_file)
            .with_context(|| format!("read github token: {}", token_file.display()))?;
        call = call.header("Authorization", format!("token {}", token.trim_end()));
    }
    let resp = call.call().with_context(|| format!("GET {url}"))?;

    let mut body = Vec::new();
    resp.into_body()
        .into_reader()
        .read_to_end(&mut body)
        .context("read response body")?;
    if body.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(&body).with_context(|| format!("parse response JSON: {url}"))
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

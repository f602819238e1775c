use std::{collections::BTreeMap, time::Duration};

use serde::Deserialize;
use serde_json::json;

use super::{NewGist, Page, RemoteFile, RemoteGist, RemoteSource};
use crate::error::{Error, Result};

const API_ROOT: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;
const USER_AGENT: &str = concat!("gistshelf/", env!("CARGO_PKG_VERSION"));

/// GitHub REST API client for the gist endpoints.
#[derive(Debug, Clone)]
pub struct GitHubSource {
    agent: ureq::Agent,
    token: String,
    api_root: String,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

impl GitHubSource {
    pub fn new(token: &str) -> Self {
        Self::with_api_root(token, API_ROOT)
    }

    /// Point the client at a different API root (GitHub Enterprise).
    pub fn with_api_root(token: &str, api_root: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(60))
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            token: token.to_string(),
            api_root: api_root.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
    }

    fn list(
        &self,
        listing: &'static str,
        path: &str,
        page: u32,
    ) -> Result<Page> {
        let url = format!("{}{path}", self.api_root);
        let fail = |reason: String| Error::RemotePagination {
            listing,
            page,
            reason,
        };

        let response = self
            .request("GET", &url)
            .query("per_page", &PER_PAGE.to_string())
            .query("page", &page.to_string())
            .call()
            .map_err(|e| classify(e, fail))?;

        let next = response.header("link").and_then(next_page);
        let items: Vec<RemoteGist> =
            response.into_json().map_err(|e| fail(e.to_string()))?;

        tracing::debug!(listing, page, count = items.len(), "listed page");
        Ok(Page { items, next })
    }
}

impl RemoteSource for GitHubSource {
    fn login(&self) -> Result<String> {
        let url = format!("{}/user", self.api_root);
        let user: User = self
            .request("GET", &url)
            .call()
            .map_err(|e| classify(e, Error::RemoteRequest))?
            .into_json()
            .map_err(|e| Error::RemoteRequest(e.to_string()))?;
        Ok(user.login)
    }

    fn list_owned(&self, page: u32) -> Result<Page> {
        self.list("owned gists", "/gists", page)
    }

    fn list_starred(&self, page: u32) -> Result<Page> {
        self.list("starred gists", "/gists/starred", page)
    }

    fn fetch_file_content(&self, file: &RemoteFile) -> Result<String> {
        let fail = |reason: String| Error::ContentFetch {
            file: file.filename.clone(),
            reason,
        };

        let Some(url) = file.raw_url.as_deref() else {
            return file
                .content
                .clone()
                .ok_or_else(|| fail("no raw url and no inline content".into()));
        };

        self.request("GET", url)
            .call()
            .map_err(|e| classify(e, fail))?
            .into_string()
            .map_err(|e| fail(e.to_string()))
    }

    fn create(&self, gist: &NewGist) -> Result<RemoteGist> {
        let url = format!("{}/gists", self.api_root);
        let files: BTreeMap<&str, serde_json::Value> = gist
            .files
            .iter()
            .map(|(name, content)| (name.as_str(), json!({ "content": content })))
            .collect();
        let body = json!({
            "description": gist.description,
            "public": gist.public,
            "files": files,
        });

        self.request("POST", &url)
            .send_json(body)
            .map_err(|e| classify(e, Error::RemoteRequest))?
            .into_json()
            .map_err(|e| Error::RemoteRequest(e.to_string()))
    }

    fn delete(&self, remote_id: &str) -> Result<()> {
        let url = format!("{}/gists/{remote_id}", self.api_root);
        self.request("DELETE", &url)
            .call()
            .map_err(|e| classify(e, Error::RemoteRequest))?;
        Ok(())
    }
}

/// Map a transport error to the taxonomy: rejected credentials are always
/// `RemoteAuth`, everything else goes through `other`.
fn classify(err: ureq::Error, other: impl FnOnce(String) -> Error) -> Error {
    match err {
        ureq::Error::Status(401, _) => {
            Error::RemoteAuth("the token was rejected (401)".to_string())
        }
        ureq::Error::Status(403, response) => Error::RemoteAuth(format!(
            "access denied (403): {}",
            response.status_text()
        )),
        ureq::Error::Status(code, response) => {
            other(format!("HTTP {code} {}", response.status_text()))
        }
        ureq::Error::Transport(transport) => other(transport.to_string()),
    }
}

/// Extract the `rel="next"` page number from a `Link` header.
fn next_page(link: &str) -> Option<u32> {
    link.split(',')
        .find(|part| part.contains(r#"rel="next""#))
        .and_then(|part| {
            let url = part.split(';').next()?.trim();
            let url = url.trim_start_matches('<').trim_end_matches('>');
            let query = url.split_once('?')?.1;
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "page")
                .and_then(|(_, value)| value.parse().ok())
        })
}

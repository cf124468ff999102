//! Package index client.

use crate::config::CrawlConfig;
use crate::model::{filename_from_url, ArtifactDescriptor, ArtifactFormat, PackageName, LINK_SUFFIXES};
use crate::traits::{IndexError, PackageIndex};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Builds the HTTP client shared by the index client and the artifact store.
pub fn http_client(config: &CrawlConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.as_str())
        .build()
}

/// Fetches listing pages from an HTML package index.
#[derive(Debug, Clone)]
pub struct IndexClient {
    config: CrawlConfig,
    http: Client,
    index_id: String,
    timeout: Duration,
}

impl IndexClient {
    pub fn new(config: &CrawlConfig, http: Client) -> Self {
        let probe = config.index_page_url("probe");
        let index_id = Url::parse(&probe)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| config.index_url.clone());
        Self {
            config: config.clone(),
            http,
            index_id,
            timeout: config.index_timeout,
        }
    }

    /// Listing page URL for `name`.
    pub fn page_url(&self, name: &PackageName) -> Result<Url, IndexError> {
        let raw = self.config.index_page_url(name.as_str());
        Url::parse(&raw).map_err(|source| IndexError::InvalidUrl { url: raw, source })
    }
}

#[async_trait]
impl PackageIndex for IndexClient {
    fn index_id(&self) -> &str {
        &self.index_id
    }

    async fn resolve(&self, name: &PackageName) -> Result<ArtifactDescriptor, IndexError> {
        let page_url = self.page_url(name)?;
        debug!(package = %name, url = %page_url, "Fetching index page");

        let response = self
            .http
            .get(page_url.as_str())
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::LookupFailed {
                name: name.to_string(),
                status: response.status().as_u16(),
            });
        }

        // Relative links resolve against the page actually served.
        let served_url = response.url().clone();
        let page = response.text().await?;

        let artifact = select_artifact_link(&page, &served_url)
            .ok_or_else(|| IndexError::NoArtifactLink(name.to_string()))?;

        if artifact.format == ArtifactFormat::Unknown {
            warn!(package = %name, file = %artifact.filename, "Unrecognized artifact format, trying as zip");
        }
        debug!(package = %name, url = %artifact.url, format = ?artifact.format, "Artifact selected");
        Ok(artifact)
    }
}

/// Picks the download link from a listing page.
///
/// Suffixes are tried in priority order (wheel, gzip sdist, bzip2 sdist,
/// egg, anything). Within one suffix the last anchor on the page wins.
/// Fragments are ignored for matching, and links without a file name (such
/// as directory links ending in `/`) are never chosen.
pub fn select_artifact_link(page: &str, page_url: &Url) -> Option<ArtifactDescriptor> {
    let hrefs = anchor_hrefs(page);

    for (suffix, format, no_dependencies) in LINK_SUFFIXES {
        let matched = hrefs
            .iter()
            .rev()
            .find(|href| {
                let target = strip_fragment(href);
                target.ends_with(suffix) && !filename_from_url(target).is_empty()
            });

        if let Some(href) = matched {
            let url = page_url
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.clone());
            return Some(ArtifactDescriptor::new(url, format, no_dependencies));
        }
    }
    None
}

fn strip_fragment(href: &str) -> &str {
    href.split_once('#').map_or(href, |(head, _)| head)
}

/// Collects the `href` of every `<a>` tag on the page, in document order.
pub fn anchor_hrefs(page: &str) -> Vec<String> {
    // ASCII lowercasing keeps byte offsets aligned with `page`.
    let lower = page.to_ascii_lowercase();
    let mut hrefs = Vec::new();
    let mut pos = 0;

    while let Some(found) = lower[pos..].find("<a") {
        let tag_start = pos + found;
        let Some(tag_len) = lower[tag_start..].find('>') else {
            break;
        };
        let tag_end = tag_start + tag_len;
        pos = tag_end + 1;

        // Skip <abbr>, <area> and friends.
        if !lower[tag_start + 2..tag_end].starts_with(|c: char| c.is_ascii_whitespace()) {
            continue;
        }

        let tag = &page[tag_start..tag_end];
        let tag_lower = &lower[tag_start..tag_end];
        if let Some(value) = attribute_value(tag, tag_lower, "href") {
            hrefs.push(value.replace("&amp;", "&"));
        }
    }
    hrefs
}

fn attribute_value<'a>(tag: &'a str, tag_lower: &str, attr: &str) -> Option<&'a str> {
    let key = format!(" {attr}=");
    let start = tag_lower.find(&key)? + key.len();
    let rest = &tag[start..];

    match rest.chars().next()? {
        quote @ ('"' | '\'') => {
            let body = &rest[1..];
            body.find(quote).map(|end| &body[..end])
        }
        _ => {
            let end = rest
                .find(|c: char| c.is_ascii_whitespace())
                .unwrap_or(rest.len());
            Some(&rest[..end])
        }
    }
}

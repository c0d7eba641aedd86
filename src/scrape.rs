use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

pub const TRUSTED_SITES: [&str; 5] = [
    "amazon.com",
    "newegg.com",
    "pcworld.com",
    "techradar.com",
    "nvidia.com",
];

const SEARCH_BASE: &str = "https://duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0";
const MIN_FRAGMENT_LEN: usize = 100;
const SPEC_KEYWORDS: [&str; 3] = ["spec", "detail", "feature"];

/// Ordered (source name, specification text) pairs. A barren source holds a
/// "no result" placeholder instead of being omitted.
pub type ScrapedSpecs = Vec<(String, String)>;

/// The raw-HTML scraper collaborator. The core feeds every returned text
/// blob into the reconciler prompt verbatim and never parses HTML itself.
pub trait SpecSource {
    fn fetch_specs(&self, product_name: &str) -> Result<ScrapedSpecs>;
}

pub fn no_result_placeholder(site: &str) -> String {
    format!("No results or no valid specs found on {site}.")
}

/// Fetches one search-result page per trusted site and applies the
/// specification-extraction heuristics to it. Per-site failures degrade to
/// placeholder text; only building the client itself can fail.
pub struct TrustedSiteScraper {
    http: Client,
    sites: Vec<String>,
}

impl TrustedSiteScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build scraper http client")?;
        Ok(Self {
            http,
            sites: TRUSTED_SITES.iter().map(ToString::to_string).collect(),
        })
    }

    fn fetch_page(&self, product_name: &str, site: &str) -> Result<String> {
        let query = format!("{product_name} specifications site:{site}");
        let url = Url::parse_with_params(SEARCH_BASE, &[("q", query.as_str())])
            .context("failed to build search url")?;

        let response = self
            .http
            .get(url.clone())
            .send()
            .with_context(|| format!("failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("request to {url} was rejected"))?;

        response
            .text()
            .with_context(|| format!("failed to read body of {url}"))
    }
}

impl SpecSource for TrustedSiteScraper {
    fn fetch_specs(&self, product_name: &str) -> Result<ScrapedSpecs> {
        let mut results = Vec::with_capacity(self.sites.len());

        for site in &self.sites {
            let text = match self.fetch_page(product_name, site) {
                Ok(html) => extract_spec_text(&html)
                    .unwrap_or_else(|| no_result_placeholder(site)),
                Err(error) => {
                    warn!(site = %site, error = %error, "scrape failed for site");
                    format!("Error fetching specs from {site}: {error:#}")
                }
            };
            results.push((site.clone(), text));
        }

        Ok(results)
    }
}

/// Offline source: a prepared JSON object mapping source name to
/// specification text.
pub struct FileSpecSource {
    path: PathBuf,
}

impl FileSpecSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SpecSource for FileSpecSource {
    fn fetch_specs(&self, _product_name: &str) -> Result<ScrapedSpecs> {
        let map: BTreeMap<String, String> = crate::util::read_json(&self.path)?;
        Ok(map.into_iter().collect())
    }
}

/// Extracts the specification section from a page using three heuristics in
/// order: tables mentioning a spec keyword, containers whose class or id
/// names "spec", then headings that announce a spec section. Falls back to
/// the whole page text.
pub fn extract_spec_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let table_selector = Selector::parse("table").ok()?;
    for table in document.select(&table_selector) {
        let text = element_text(&table);
        let lowered = text.to_lowercase();
        if SPEC_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
            return Some(text);
        }
    }

    let container_selector = Selector::parse("div, section").ok()?;
    for container in document.select(&container_selector) {
        if !names_spec_section(&container) {
            continue;
        }
        let text = element_text(&container);
        if text.len() > MIN_FRAGMENT_LEN {
            return Some(text);
        }
    }

    let heading_selector = Selector::parse("h1, h2, h3, h4, h5, h6").ok()?;
    for heading in document.select(&heading_selector) {
        if !element_text(&heading).to_lowercase().contains("spec") {
            continue;
        }
        if let Some(sibling) = heading.next_siblings().filter_map(ElementRef::wrap).next() {
            let text = element_text(&sibling);
            if text.len() > MIN_FRAGMENT_LEN {
                return Some(text);
            }
        }
    }

    let body_text = element_text(&document.root_element());
    if body_text.trim().is_empty() {
        None
    } else {
        Some(body_text)
    }
}

fn names_spec_section(element: &ElementRef) -> bool {
    let value = element.value();
    let id_names_spec = value
        .attr("id")
        .map(|id| id.to_lowercase().contains("spec"))
        .unwrap_or(false);
    let class_names_spec = value
        .attr("class")
        .map(|class| class.to_lowercase().contains("spec"))
        .unwrap_or(false);
    id_names_spec || class_names_spec
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

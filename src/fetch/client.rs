use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;
use urlencoding::encode;

/// Maximum works per page the OpenAlex API allows.
const PER_PAGE: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct WorksMeta {
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct WorksPage {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub meta: WorksMeta,
}

pub struct OpenAlexClient {
    client: Client,
    base_url: String,
}

impl OpenAlexClient {
    pub fn new(base_url: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, base_url }
    }

    /// Fetches every work for one author, page by page.
    pub async fn author_works(&self, author_id: &str) -> Result<Vec<Value>> {
        self.all_pages(&format!("author.id:{author_id}")).await
    }

    /// Pages through a works filter until `meta.count` is exhausted. A page
    /// that keeps failing after retries ends the loop with the works
    /// collected so far; only a failure on the very first page is an error.
    pub async fn all_pages(&self, filter: &str) -> Result<Vec<Value>> {
        let mut all_works = Vec::new();
        let mut page = 1usize;

        loop {
            let url = format!(
                "{}/works?filter={}\u{0026}per-page={}\u{0026}page={}",
                self.base_url,
                encode(filter),
                PER_PAGE,
                page
            );

            let works_page = match self.fetch_page(&url).await {
                Ok(works_page) => works_page,
                Err(e) => {
                    if all_works.is_empty() {
                        return Err(e);
                    }
                    warn!("Giving up on page {} of filter '{}': {}", page, filter, e);
                    break;
                }
            };

            if works_page.results.is_empty() {
                break;
            }
            all_works.extend(works_page.results);

            if all_works.len() as u64 >= works_page.meta.count {
                break;
            }
            page += 1;
        }

        Ok(all_works)
    }

    async fn fetch_page(&self, url: &str) -> Result<WorksPage> {
        let max_retries = 3;

        for attempt in 0..max_retries {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    } else if status.as_u16() == 429 {
                        // Rate limited - retry with backoff
                        let wait = response
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(2u64.pow(attempt as u32));
                        warn!("Rate limited, waiting {}s", wait);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        continue;
                    } else if status.as_u16() >= 500 && attempt < max_retries - 1 {
                        let wait = 2u64.pow(attempt as u32);
                        warn!("HTTP {}, retrying in {}s", status, wait);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        continue;
                    } else {
                        return Err(anyhow!("HTTP {}", status));
                    }
                }
                Err(e) => {
                    if attempt < max_retries - 1 {
                        let wait = 2u64.pow(attempt as u32);
                        warn!("Request error, retrying in {}s: {}", wait, e);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(anyhow!("Max retries exceeded"))
    }
}

use reqwest::Client as HttpClient;
use shared::NewsArticle;
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum NewsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Feed returned status {0}")]
    Status(u16),
    #[error("Failed to parse feed: {0}")]
    Parse(#[from] rss::Error),
    #[error("Invalid feed URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Clone)]
pub struct NewsService {
    http_client: HttpClient,
    feed_url: Url,
}

impl NewsService {
    pub fn new(feed_url: &str) -> Result<Self, NewsError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http_client,
            feed_url: Url::parse(feed_url)?,
        })
    }

    pub fn feed_url(&self) -> &Url {
        &self.feed_url
    }

    /// The configured feed URL with `extra_terms` appended to its `q` parameter.
    pub fn url_for(&self, extra_terms: Option<&str>) -> Url {
        let extra = match extra_terms.map(str::trim) {
            Some(terms) if !terms.is_empty() => terms,
            _ => return self.feed_url.clone(),
        };

        let pairs: Vec<(String, String)> = self
            .feed_url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let has_query = pairs.iter().any(|(k, _)| k == "q");

        let mut url = self.feed_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (key, value) in &pairs {
                if key == "q" {
                    query.append_pair(key, &format!("{} {}", value, extra));
                } else {
                    query.append_pair(key, value);
                }
            }
            if !has_query {
                query.append_pair("q", extra);
            }
        }
        url
    }

    pub async fn fetch(&self, extra_terms: Option<&str>) -> Result<Vec<NewsArticle>, NewsError> {
        let url = self.url_for(extra_terms);
        log::info!("Fetching news feed {}", url);

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        super::parse_feed(&body)
    }
}

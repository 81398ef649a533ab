use serde::Deserialize;
use std::io;
use std::time::Duration;
use url::Url;

use crate::config::EncyclopediaConfig;
use crate::error::AppError;

use super::SummarySource;

/// Summaries from the Wikipedia REST API (`/page/summary/{title}`).
pub struct WikipediaSource {
    agent: ureq::Agent,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    extract: String,
}

impl WikipediaSource {
    pub fn from_config(config: &EncyclopediaConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("naturelog/", env!("CARGO_PKG_VERSION")))
            .build();

        Self {
            agent,
            endpoint: config.endpoint.clone(),
        }
    }

    /// Endpoint with the species appended as one percent-encoded path
    /// segment, in Wikipedia title form (words joined by underscores).
    fn summary_url(&self, species: &str) -> Result<Url, AppError> {
        let title = species.split_whitespace().collect::<Vec<_>>().join("_");
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| AppError::Upstream(format!("Bad encyclopedia endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Upstream("Encyclopedia endpoint cannot take a path".to_string()))?
            .pop_if_empty()
            .push(&title);
        Ok(url)
    }
}

impl SummarySource for WikipediaSource {
    fn fetch_summary(&self, species: &str) -> Result<Option<String>, AppError> {
        let url = self.summary_url(species)?;

        let response = match self.agent.get(url.as_str()).set("Accept", "application/json").call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(ureq::Error::Status(code, _)) => {
                return Err(AppError::Upstream(format!("HTTP {code}")))
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(if is_timeout(&t) {
                    AppError::UpstreamTimeout
                } else {
                    AppError::Upstream(t.to_string())
                })
            }
        };

        let page: PageSummary = response
            .into_json()
            .map_err(|e| AppError::Upstream(format!("Failed to parse summary: {e}")))?;

        // Disambiguation pages list candidates rather than describing a species
        if page.kind == "disambiguation" || page.extract.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(page.extract))
    }
}

fn is_timeout(transport: &ureq::Transport) -> bool {
    std::error::Error::source(transport)
        .and_then(|e| e.downcast_ref::<io::Error>())
        .is_some_and(|e| matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock))
}

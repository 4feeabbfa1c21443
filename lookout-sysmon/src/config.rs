use lookout::Delivery;
use serde::Deserialize;
use std::{fs, io, path::Path};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error)
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Scheme, host and port of the GraphQL server.
    pub base_url: String,

    /// Path of the endpoint that answers fetch and streaming fetch requests.
    pub graphql_path: String,

    /// Path of the server-sent event subscription endpoint.
    pub sse_path: String,

    /// Path of the `graphql-ws` endpoint.
    pub ws_path: String,

    /// The subscription the streaming views run.
    pub query: String,

    /// The one-shot query the fetch view runs. A plain fetch can't follow a subscription.
    pub fetch_query: String,

    /// Sent as the `Origin` of every request.
    pub origin: Option<String>,

    /// Log level for tracing (e.g. "info", "debug").
    pub log_level: String,

    /// The view to show first.
    pub route: String,

    /// Stop after this many seconds. Runs until Ctrl-C if unset.
    pub duration_secs: Option<u64>
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            base_url: "http://localhost:9009".to_string(),
            graphql_path: "/test/graphql".to_string(),
            sse_path: "/test/sse-subscription".to_string(),
            ws_path: "/test/subscriptions".to_string(),
            query: "subscription { system { timestamp cpu { percent } memory { percent } } }"
                .to_string(),
            fetch_query: "{ system { timestamp cpu { percent } memory { percent } } }".to_string(),
            origin: None,
            log_level: "info".to_string(),
            route: "subscribe".to_string(),
            duration_secs: None
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source
        })?;
        Self::parse(&file)
    }

    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str::<AppConfig>(json)?)
    }

    pub fn level(&self) -> LevelFilter {
        match self.log_level.to_lowercase().as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            "off" => LevelFilter::OFF,
            _ => LevelFilter::INFO
        }
    }

    /// The operation a view over `delivery` sends.
    pub fn query_for(&self, delivery: Delivery) -> &str {
        match delivery {
            Delivery::Fetch => &self.fetch_query,
            _ => &self.query
        }
    }

    /// The endpoint a delivery talks to.
    pub fn endpoint(&self, delivery: Delivery) -> String {
        let path = match delivery {
            Delivery::Fetch | Delivery::StreamingFetch => &self.graphql_path,
            Delivery::EventSource => &self.sse_path,
            Delivery::WebSocket => &self.ws_path
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod test {
    use super::AppConfig;
    use lookout::Delivery;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_partial_config() {
        let config = AppConfig::parse(
            r#"{ "base_url": "http://127.0.0.1:8000/", "log_level": "DEBUG", "duration_secs": 5 }"#
        )
        .unwrap();
        assert_eq!(config.level(), LevelFilter::DEBUG);
        assert_eq!(config.duration_secs, Some(5));
        assert_eq!(config.route, "subscribe");
        assert_eq!(
            config.endpoint(Delivery::EventSource),
            "http://127.0.0.1:8000/test/sse-subscription"
        );
        assert_eq!(
            config.endpoint(Delivery::WebSocket),
            "http://127.0.0.1:8000/test/subscriptions"
        );
    }

    #[test]
    fn test_fetch_view_runs_a_query() {
        let config = AppConfig::default();
        assert!(config.query_for(Delivery::Fetch).starts_with("{ system"));
        for delivery in [Delivery::StreamingFetch, Delivery::EventSource, Delivery::WebSocket].iter() {
            assert!(config.query_for(*delivery).starts_with("subscription"));
        }

        let config = AppConfig::parse(r#"{ "fetch_query": "{ uptime }" }"#).unwrap();
        assert_eq!(config.query_for(Delivery::Fetch), "{ uptime }");
    }

    #[test]
    fn test_invalid_config() {
        assert!(AppConfig::parse(r#"{ "duration_secs": "soon" }"#).is_err());
        assert!(AppConfig::load_from_file("/nonexistent/config.json").is_err());
    }
}

use crate::{
    error::RequestError,
    types::{Delivery, HeaderPair, Method, RequestMode, RequestOptions},
    utils::{progressive_hash, query_hash},
    QueryBody
};
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

const SAFELISTED_HEADERS: [&str; 4] = ["accept", "accept-language", "content-language", "content-type"];

/// An unvalidated description of a request. Nothing is checked until [build](#method.build)
/// is called, which lets a view hold on to a template and surface construction failures
/// through its error path instead of at configuration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTemplate {
    pub endpoint: String,
    #[serde(default)]
    pub options: RequestOptions,
    pub query: String,
    #[serde(default)]
    pub variables: Value,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>
}

impl RequestTemplate {
    pub fn new<E: Into<String>, Q: Into<String>>(endpoint: E, query: Q) -> Self {
        RequestTemplate {
            endpoint: endpoint.into(),
            options: RequestOptions::default(),
            query: query.into(),
            variables: Value::Null,
            operation_name: None
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.options.delivery = delivery;
        self
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_operation_name<N: Into<String>>(mut self, operation_name: N) -> Self {
        self.operation_name = Some(operation_name.into());
        self
    }

    /// Validate the template against the options recognized by its delivery.
    pub fn build(&self) -> Result<Request, RequestError> {
        let RequestOptions {
            delivery,
            method,
            mode,
            headers,
            origin
        } = &self.options;
        let delivery = *delivery;

        if self.query.trim().is_empty() {
            return Err(RequestError::EmptyQuery);
        }

        let variables = match &self.variables {
            Value::Null => None,
            Value::Object(map) => Some(map.clone()),
            other => return Err(RequestError::InvalidVariables(kind_of(other).to_string()))
        };

        let url = parse_endpoint(&self.endpoint, delivery)?;
        let method = resolve_method(*method, delivery)?;

        for HeaderPair(key, value) in headers {
            HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| RequestError::InvalidHeader(key.clone()))?;
            HeaderValue::from_str(value).map_err(|_| RequestError::InvalidHeader(key.clone()))?;
        }

        let mut headers = headers.clone();
        match mode {
            RequestMode::NoCors => {
                if let Some(HeaderPair(key, _)) = headers
                    .iter()
                    .find(|HeaderPair(key, _)| !is_safelisted(key))
                {
                    return Err(RequestError::UnsupportedOption(format!("header `{}`", key)));
                }
            }
            RequestMode::SameOrigin => {
                let origin = origin.as_ref().ok_or(RequestError::MissingOrigin)?;
                let origin_url =
                    Url::parse(origin).map_err(|source| RequestError::InvalidEndpoint {
                        endpoint: origin.clone(),
                        source
                    })?;
                if !same_origin(&url, &origin_url) {
                    return Err(RequestError::CrossOrigin {
                        endpoint: url.to_string(),
                        origin: origin.clone()
                    });
                }
            }
            RequestMode::Cors => {
                if let Some(origin) = origin {
                    let has_origin = headers
                        .iter()
                        .any(|HeaderPair(key, _)| key.eq_ignore_ascii_case("origin"));
                    if !has_origin {
                        HeaderValue::from_str(origin)
                            .map_err(|_| RequestError::InvalidHeader("origin".to_string()))?;
                        headers.push(HeaderPair::new("origin", origin.clone()));
                    }
                }
            }
        }

        let body = QueryBody {
            query: self.query.clone(),
            variables,
            operation_name: self.operation_name.clone()
        };
        let key = progressive_hash(query_hash(&body.query), &body);

        Ok(Request {
            key,
            url,
            delivery,
            method,
            headers,
            body
        })
    }
}

/// A validated request, ready to be handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    key: u64,
    url: Url,
    delivery: Delivery,
    method: Method,
    headers: Vec<HeaderPair>,
    body: QueryBody
}

impl Request {
    /// Identifies requests with the same query, variables and operation name.
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn headers(&self) -> &[HeaderPair] {
        &self.headers
    }

    pub fn body(&self) -> &QueryBody {
        &self.body
    }

    /// The `variables` of the body, or an empty object.
    pub fn variables(&self) -> Map<String, Value> {
        self.body.variables.clone().unwrap_or_default()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object"
    }
}

fn parse_endpoint(endpoint: &str, delivery: Delivery) -> Result<Url, RequestError> {
    let mut url = Url::parse(endpoint).map_err(|source| RequestError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        source
    })?;

    let unsupported = |url: &Url| RequestError::UnsupportedScheme {
        scheme: url.scheme().to_string(),
        delivery
    };

    let scheme = url.scheme().to_string();
    match (delivery, scheme.as_str()) {
        (Delivery::WebSocket, "ws") | (Delivery::WebSocket, "wss") => {}
        (Delivery::WebSocket, "http") => url.set_scheme("ws").map_err(|_| unsupported(&url))?,
        (Delivery::WebSocket, "https") => url.set_scheme("wss").map_err(|_| unsupported(&url))?,
        (Delivery::WebSocket, _) => return Err(unsupported(&url)),
        (_, "http") | (_, "https") => {}
        _ => return Err(unsupported(&url))
    }

    Ok(url)
}

fn resolve_method(method: Option<Method>, delivery: Delivery) -> Result<Method, RequestError> {
    match (delivery, method) {
        (Delivery::Fetch, None) => Ok(Method::Post),
        (Delivery::Fetch, Some(method)) => Ok(method),
        (Delivery::StreamingFetch, None) | (Delivery::StreamingFetch, Some(Method::Post)) => {
            Ok(Method::Post)
        }
        (Delivery::EventSource, None) | (Delivery::EventSource, Some(Method::Get)) => {
            Ok(Method::Get)
        }
        (Delivery::WebSocket, None) => Ok(Method::Get),
        (delivery, Some(method)) => Err(RequestError::UnsupportedMethod { method, delivery })
    }
}

fn is_safelisted(header: &str) -> bool {
    SAFELISTED_HEADERS
        .iter()
        .any(|safe| safe.eq_ignore_ascii_case(header))
}

/// Socket endpoints share an origin with the page that serves them, so `ws`/`wss` compare
/// as `http`/`https`.
fn same_origin(a: &Url, b: &Url) -> bool {
    fn scheme(url: &Url) -> &str {
        match url.scheme() {
            "ws" => "http",
            "wss" => "https",
            other => other
        }
    }

    scheme(a) == scheme(b)
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

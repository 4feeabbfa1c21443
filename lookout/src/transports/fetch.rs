use super::{ensure_success, sse, with_headers, FeedStream, Transport, TransportContext};
use crate::{Method, QueryError, Request, TransportError};
use futures::{stream, StreamExt};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

/// The default fetch delivery. A single round trip that emits the response body and completes.
pub(crate) struct FetchTransport;

/// `POST`s the query and follows the event stream the server hands back for subscriptions.
pub(crate) struct StreamingFetchTransport;

/// Build the round trip for a request. `POST` sends the query body as JSON, `GET` sends its
/// fields as query parameters with the variables JSON-encoded. Caller headers replace the
/// defaults of the same name.
fn build(request: &Request, context: &TransportContext) -> reqwest::RequestBuilder {
    let body = request.body();
    match request.method() {
        Method::Post => with_headers(
            context.http.post(request.url().clone()),
            &context.headers,
            &[("Accept", "application/json"), ("Content-Type", "application/json")]
        )
        .json(body),
        Method::Get => {
            let mut params = vec![("query", body.query.clone())];
            if let Some(ref variables) = body.variables {
                params.push(("variables", Value::Object(variables.clone()).to_string()));
            }
            if let Some(ref operation_name) = body.operation_name {
                params.push(("operationName", operation_name.clone()));
            }
            with_headers(
                context.http.get(request.url().clone()).query(&params),
                &context.headers,
                &[("Accept", "application/json")]
            )
        }
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, TransportError> {
    let bytes = ensure_success(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn single(payload: Value) -> FeedStream {
    stream::once(async move { Ok(payload) }).boxed()
}

#[async_trait]
impl Transport for FetchTransport {
    async fn open(
        &self,
        request: &Request,
        context: &TransportContext
    ) -> Result<FeedStream, QueryError> {
        debug!(url = %request.url(), method = %request.method(), "fetching");
        let response = build(request, context)
            .send()
            .await
            .map_err(TransportError::from)?;

        if response.status() == StatusCode::CREATED {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|location| location.to_str().ok())
                .unwrap_or_default()
                .to_string();
            return Err(TransportError::SubscriptionCreated(location).into());
        }

        let payload = read_json(response).await?;
        Ok(single(payload))
    }
}

#[async_trait]
impl Transport for StreamingFetchTransport {
    async fn open(
        &self,
        request: &Request,
        context: &TransportContext
    ) -> Result<FeedStream, QueryError> {
        debug!(url = %request.url(), "streaming fetch");
        let response = build(request, context)
            .send()
            .await
            .map_err(TransportError::from)?;

        if response.status() != StatusCode::CREATED {
            let payload = read_json(response).await?;
            return Ok(single(payload));
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .ok_or(TransportError::MissingLocation)?
            .to_str()
            .map_err(|_| TransportError::InvalidLocation("<non-ascii>".to_string()))?;
        let location = request
            .url()
            .join(location)
            .map_err(|_| TransportError::InvalidLocation(location.to_string()))?;

        debug!(%location, "subscription created, following event stream");
        let stream = sse::connect(&context.http, location, &context.headers).await?;
        Ok(stream)
    }
}

//! Route table: maps method + path onto service operations.

use serde::Serialize;
use tracing::{debug, error, warn};

use super::request::Request;
use super::response::{status_for, Response};
use crate::resilience::CallOutcome;
use crate::service::WeatherPoetryService;
use crate::types::{GeocodeQuery, NewComment, Poem, PoetryRequest, Subscription, WeatherQuery};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Weather,
    Forecast,
    Geocode,
    Generate,
    Comments,
    Subscribe,
}

impl Route {
    /// Every route is served both bare and under `/api`.
    fn resolve(path: &str) -> Option<Self> {
        let path = path.strip_prefix("/api").unwrap_or(path);
        let path = path.trim_end_matches('/');
        match path {
            "/weather" => Some(Route::Weather),
            "/forecast" => Some(Route::Forecast),
            "/geocode" => Some(Route::Geocode),
            "/generate" => Some(Route::Generate),
            "/comments" => Some(Route::Comments),
            "/subscribe" => Some(Route::Subscribe),
            _ => None,
        }
    }
}

/// Dispatch one request to the service and render the outcome.
pub async fn handle(service: &WeatherPoetryService, request: &Request) -> Response {
    let Some(route) = Route::resolve(request.path()) else {
        debug!(path = request.path(), "no such route");
        return Response::message(404, "Not found");
    };

    match (request.method(), route) {
        ("GET", Route::Weather) => {
            respond(weather_query(request).map(|q| async move { service.current_weather(q).await }))
                .await
        }
        ("GET", Route::Forecast) => {
            let city = request.query_param("city").unwrap_or_default();
            render(service.forecast(city).await)
        }
        ("GET", Route::Geocode) => {
            let query = GeocodeQuery::from_params(
                request.query_param("query"),
                request.query_param("lat"),
                request.query_param("lon"),
            );
            respond(query.map(|q| async move { service.geocode(q).await })).await
        }
        ("POST", Route::Generate) => match request.json::<PoetryRequest>() {
            Ok(body) => match service.generate_poetry(body).await {
                Ok(poem) => Response::json(200, &poem),
                Err(e) => render_outcome::<Poem>(e),
            },
            Err(e) => render_error(&e),
        },
        ("GET", Route::Comments) => render(service.list_comments().await),
        ("POST", Route::Comments) => match request.json::<NewComment>() {
            Ok(body) => render(service.add_comment(&body.comment).await),
            Err(e) => render_error(&e),
        },
        ("POST", Route::Subscribe) => match request.json::<Subscription>() {
            Ok(body) => render(service.subscribe(&body.email).await),
            Err(e) => render_error(&e),
        },
        (method, _) => {
            debug!(method, path = request.path(), "method not allowed");
            Response::message(405, "Method not allowed")
        }
    }
}

fn weather_query(request: &Request) -> Result<WeatherQuery> {
    WeatherQuery::from_params(
        request.query_param("city"),
        request.query_param("lat"),
        request.query_param("lon"),
    )
}

async fn respond<T, Fut>(prepared: Result<Fut>) -> Response
where
    T: Serialize,
    Fut: std::future::Future<Output = Result<T>>,
{
    match prepared {
        Ok(fut) => render(fut.await),
        Err(e) => render_error(&e),
    }
}

fn render<T: Serialize>(result: Result<T>) -> Response {
    match result {
        Ok(value) => Response::json(200, &value),
        Err(e) => render_error(&e),
    }
}

fn render_error(err: &Error) -> Response {
    log_failure(err);
    Response::from_error(err)
}

/// Failures behind the retry wrapper keep its `{errorKind, message}` shape.
fn render_outcome<T: Serialize>(err: Error) -> Response {
    log_failure(&err);
    let status = status_for(err.kind());
    Response::json(status, &CallOutcome::<T>::from(Err(err)))
}

fn log_failure(err: &Error) {
    if status_for(err.kind()) >= 500 {
        error!(kind = %err.kind(), error = %err, "request failed");
    } else {
        warn!(kind = %err.kind(), error = %err, "request rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_prefix_and_trailing_slash_resolve() {
        assert_eq!(Route::resolve("/weather"), Some(Route::Weather));
        assert_eq!(Route::resolve("/api/weather"), Some(Route::Weather));
        assert_eq!(Route::resolve("/api/comments/"), Some(Route::Comments));
        assert_eq!(Route::resolve("/api"), None);
        assert_eq!(Route::resolve("/apiweather"), None);
    }
}

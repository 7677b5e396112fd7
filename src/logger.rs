use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Per-request identifier, stored in request extensions by `LoggerMiddleware`.
#[derive(Clone, Debug)]
pub struct RequestId(pub Uuid);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

pub const REQUEST_ID_HEADER: &str = "x-request-id";

tokio::task_local! {
    static CURRENT_REQUEST_ID: RequestId;
}

/// Id of the request being served. `None` outside `LoggerMiddleware`.
pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// Request logging middleware.
///
/// Opens a `http_request` span per request, tags it with a fresh request id
/// and logs method, path, status and latency on completion. The query string
/// is logged at debug level only; it may carry search terms.
///
/// The id is echoed in `X-Request-Id` and is the `error_id` of any error
/// body, including errors raised by inner middleware, which are rendered
/// here while the id is still in scope.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let request_id = RequestId(Uuid::new_v4());
        let method = req.method().to_string();
        let path = req.path().to_string();

        req.extensions_mut().insert(request_id.clone());

        let span = tracing::info_span!(
            "http_request",
            request_id = %request_id,
            method = %method,
            path = %path,
        );

        if !req.query_string().is_empty() {
            tracing::debug!(parent: &span, query = %req.query_string(), "Query string");
        }

        let service = self.service.clone();
        let http_request = req.request().clone();
        let header_value = HeaderValue::from_str(&request_id.to_string()).ok();

        let handled = async move {
            let result = service.call(req).await;
            let elapsed_ms = start_time.elapsed().as_millis() as u64;

            let mut response = match result {
                Ok(res) => {
                    let status = res.status().as_u16();
                    if res.status().is_server_error() {
                        tracing::error!(status, elapsed_ms, "Request completed");
                    } else {
                        tracing::info!(status, elapsed_ms, "Request completed");
                    }
                    res.map_into_left_body()
                }
                Err(e) => {
                    let status = e.as_response_error().status_code().as_u16();
                    tracing::warn!(status, elapsed_ms, "Request rejected by middleware");
                    ServiceResponse::new(http_request, e.error_response()).map_into_right_body()
                }
            };

            if let Some(value) = header_value {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
            }
            Ok(response)
        };

        Box::pin(CURRENT_REQUEST_ID.scope(request_id, handled.instrument(span)))
    }
}

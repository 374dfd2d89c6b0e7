/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use std::{rc::Rc, time::Duration};

use crate::incoming_api;
use crate::tools::prometheus::INCOMING_API;
use actix_http::{h1, header::CONTENT_LENGTH, StatusCode};
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{self, forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web::{self, Data},
    Error, HttpRequest,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use tokio::time::{timeout, Instant};
use tracing::Span;
use tracing::{error, info, warn};
use tracing_actix_web::{DefaultRootSpanBuilder, RootSpanBuilder};
use uuid::Uuid;

use crate::{environment::AppState, tools::error::AppError};

/// Fails a request with `RequestTimeout` when its handler has not produced a
/// response within `request_timeout` milliseconds.
///
/// Only the time to the response head is bounded. An event stream that has
/// started keeps flowing for as long as its client stays connected.
pub struct RequestTimeout;

impl<S: 'static> Transform<S, ServiceRequest> for RequestTimeout
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestTimeoutMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTimeoutMiddleware { service }))
    }
}

pub struct RequestTimeoutMiddleware<S> {
    service: S,
}

impl<S> Service<ServiceRequest> for RequestTimeoutMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let request_timeout = req
            .app_data::<Data<AppState>>()
            .map(|data| Duration::from_millis(data.request_timeout));
        let fut = self.service.call(req);

        match request_timeout {
            Some(request_timeout) => Box::pin(async move {
                timeout(request_timeout, fut)
                    .await
                    .map_err(|_| actix_web::Error::from(AppError::RequestTimeout))?
            }),
            None => Box::pin(fut),
        }
    }
}

/// Root span of every request, tagged with the caller's request id (or a fresh
/// one) and the client identifier when present.
pub struct DomainRootSpanBuilder;

impl RootSpanBuilder for DomainRootSpanBuilder {
    fn on_request_start(request: &ServiceRequest) -> Span {
        let request_id = header_value(request.request(), "x-request-id")
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let client_id = header_value(request.request(), "x-client-id");

        tracing_actix_web::root_span!(request, request_id, client_id)
    }

    fn on_request_end<B: MessageBody>(span: Span, outcome: &Result<ServiceResponse<B>, Error>) {
        DefaultRootSpanBuilder::on_request_end(span, outcome);
    }
}

/// Logs every request once it has been answered and records its latency in
/// the incoming API histogram, labelled by route pattern and error code.
pub struct IncomingRequestMetrics;

impl<S> Transform<S, ServiceRequest> for IncomingRequestMetrics
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = IncomingRequestMetricsMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IncomingRequestMetricsMiddleware { service }))
    }
}

pub struct IncomingRequestMetricsMiddleware<S> {
    service: S,
}

impl<S> Service<ServiceRequest> for IncomingRequestMetricsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let request_meta = RequestMeta::from(req.request());

        let fut = self.service.call(req);
        Box::pin(async move {
            match fut.await {
                Ok(response) => {
                    // Route patterns are only known once routing has happened.
                    RequestMeta::from(response.request()).record(
                        response.response().error(),
                        response.status(),
                        start_time,
                    );
                    Ok(response)
                }
                Err(err) => {
                    request_meta.record(Some(&err), err.error_response().status(), start_time);
                    Err(err)
                }
            }
        })
    }
}

/// Buffers request bodies so that the raw payload of a failed report can be
/// logged, for the error codes listed in `log_unprocessible_req_body`
/// (e.g. `MALFORMED_REPORT`). Does nothing when the list is empty.
pub struct LogIncomingRequestBody;

impl<S: 'static> Transform<S, ServiceRequest> for LogIncomingRequestBody
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = LogIncomingRequestBodyMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LogIncomingRequestBodyMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct LogIncomingRequestBodyMiddleware<S> {
    service: Rc<S>,
}

impl<S> Service<ServiceRequest> for LogIncomingRequestBodyMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        Box::pin(async move {
            let logged_codes = req
                .app_data::<Data<AppState>>()
                .map_or(vec![], |data| data.log_unprocessible_req_body.to_owned());

            if logged_codes.is_empty() {
                return svc.call(req).await;
            }

            let body = req.extract::<web::Bytes>().await?;
            req.set_payload(bytes_to_payload(body.clone()));

            let result = svc.call(req).await;
            let err_resp = match &result {
                Ok(response) => response.response().error(),
                Err(err) => Some(err),
            };
            if let Some(err_resp) = err_resp {
                if logged_codes.contains(&err_resp.to_string()) {
                    warn!(tag = "[Unprocessible Request Body]", error_code = %err_resp, "Raw Request Body: {:?}", body);
                }
            }
            result
        })
    }
}

/// Rejects requests whose declared `Content-Length` exceeds `max_allowed_req_size`
/// before the handler reads the body.
pub struct CheckContentLength;

impl<S> Transform<S, ServiceRequest> for CheckContentLength
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = CheckContentLengthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CheckContentLengthMiddleware { service }))
    }
}

pub struct CheckContentLengthMiddleware<S> {
    service: S,
}

impl<S> Service<ServiceRequest> for CheckContentLengthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let content_length = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|content_length| content_length.to_str().ok()?.parse::<usize>().ok());
        let limit = req
            .app_data::<Data<AppState>>()
            .map(|data| data.max_allowed_req_size);

        if let (Some(content_length), Some(limit)) = (content_length, limit) {
            if content_length > limit {
                return Box::pin(ready(Err(actix_web::Error::from(
                    AppError::LargePayloadSize(content_length, limit),
                ))));
            }
        }

        let fut = self.service.call(req);
        Box::pin(fut)
    }
}

fn bytes_to_payload(buf: web::Bytes) -> dev::Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    dev::Payload::from(pl)
}

fn header_value(request: &HttpRequest, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

struct RequestMeta {
    method: String,
    /// Path with matched segments replaced by `:name`, so metrics stay low-cardinality.
    path: String,
    headers: String,
}

impl From<&HttpRequest> for RequestMeta {
    fn from(request: &HttpRequest) -> Self {
        let mut path = request.path().to_string();
        request
            .match_info()
            .iter()
            .for_each(|(path_name, path_val)| {
                path = path.replace(path_val, format!(":{path_name}").as_str());
            });

        RequestMeta {
            method: request.method().to_string(),
            path,
            headers: format!("{:?}", request.headers()),
        }
    }
}

impl RequestMeta {
    fn record(&self, err_resp: Option<&Error>, resp_status: StatusCode, time: Instant) {
        let RequestMeta {
            method,
            path,
            headers,
        } = self;

        match err_resp {
            Some(err_resp) => {
                let err_resp_code = err_resp.to_string();
                error!(tag = "[INCOMING API - ERROR]", request_method = %method, request_path = %path, request_headers = %headers, response_code = err_resp_code, response_status = resp_status.as_str(), latency = format!("{:?}ms", time.elapsed().as_millis()));
                incoming_api!(
                    method.as_str(),
                    path.as_str(),
                    resp_status.as_str(),
                    err_resp_code.as_str(),
                    time
                );
            }
            None => {
                info!(tag = "[INCOMING API]", request_method = %method, request_path = %path, request_headers = %headers, response_status = resp_status.as_str(), latency = format!("{:?}ms", time.elapsed().as_millis()));
                incoming_api!(
                    method.as_str(),
                    path.as_str(),
                    resp_status.as_str(),
                    "SUCCESS",
                    time
                );
            }
        }
    }
}

use crate::tracing::RequestId;
use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
static REQUEST_ID: HeaderName = HeaderName::from_static(REQUEST_ID_HEADER);

const MAX_CALLER_ID_LEN: usize = 128;

/// A caller-chosen id is kept only if it is short, printable ASCII.
fn caller_request_id(request: &Request) -> Option<RequestId> {
    let raw = request.headers().get(&REQUEST_ID)?.to_str().ok()?.trim();
    let usable = !raw.is_empty()
        && raw.len() <= MAX_CALLER_ID_LEN
        && raw.bytes().all(|b| b.is_ascii_graphic());
    usable.then(|| RequestId::new(raw))
}

/// Gives each request an id, visible to handlers as an extension and to error
/// bodies through the task-local scope, and returns it in `x-request-id`.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = caller_request_id(&request).unwrap_or_default();
    request.extensions_mut().insert(id.clone());

    let header = HeaderValue::from_str(id.as_str()).ok();
    let mut response = crate::tracing::scope_request_id(id, next.run(request)).await;
    if let Some(value) = header {
        response.headers_mut().insert(REQUEST_ID.clone(), value);
    }
    response
}

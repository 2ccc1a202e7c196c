//! Interception of `/ipfs-sw/<cid>[/<path>]` content requests.

use crate::error::{WorkerError, WorkerResult};
use crate::handle::ClientHandle;
use crate::state::WorkerState;
use axum::body::Body;
use axum::extract::{Query, Request, State};
use axum::http::header::{
    ACCEPT_RANGES, ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONNECTION, CONTENT_LENGTH,
    CONTENT_TYPE, HOST, TRANSFER_ENCODING,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use cairn_core::mime::content_type_for_name;
use cairn_core::{Cid, INTERCEPT_PREFIX};
use futures::TryStreamExt;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::Deserialize;
use std::sync::Arc;

/// Characters escaped when encoding a path segment into a URL.
pub const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const CACHE_CONTROL_VALUE: &str = "public, max-age=86400";

#[derive(Debug, Default, Deserialize)]
struct ContentQuery {
    filename: Option<String>,
    size: Option<String>,
}

/// A parsed content request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub cid: Cid,
    /// Decoded path segments below the CID.
    pub path: Vec<String>,
    /// `filename` query parameter.
    pub filename: Option<String>,
    /// Expected size from the `size` query parameter.
    pub size: Option<u64>,
}

impl ContentRequest {
    /// Parse an intercepted URI.
    ///
    /// Returns `None` for paths outside the interception prefix.
    pub fn from_uri(uri: &Uri) -> Option<WorkerResult<Self>> {
        let path = uri.path();
        let rest = match path.strip_prefix(INTERCEPT_PREFIX) {
            Some(rest) => rest,
            None if path == INTERCEPT_PREFIX.trim_end_matches('/') => "",
            None => return None,
        };
        Some(Self::parse(rest, uri))
    }

    fn parse(rest: &str, uri: &Uri) -> WorkerResult<Self> {
        let mut segments = rest.split('/').filter(|s| !s.is_empty());
        let cid = segments
            .next()
            .ok_or_else(|| WorkerError::BadRequest("missing CID".to_string()))?;
        let cid = Cid::parse(cid)?;

        let path = segments
            .map(|segment| {
                percent_decode_str(segment)
                    .decode_utf8()
                    .map(|s| s.into_owned())
                    .map_err(|e| WorkerError::BadRequest(format!("invalid path segment: {e}")))
            })
            .collect::<WorkerResult<Vec<_>>>()?;

        let Query(query) = Query::<ContentQuery>::try_from_uri(uri)
            .map_err(|e| WorkerError::BadRequest(format!("invalid query: {e}")))?;
        let size = query
            .size
            .map(|s| {
                s.parse::<u64>()
                    .map_err(|_| WorkerError::BadRequest(format!("invalid size: {s}")))
            })
            .transpose()?;

        Ok(Self {
            cid,
            path,
            filename: query.filename,
            size,
        })
    }

    /// `ipfs://<cid>[/<path>]` with path segments re-encoded.
    pub fn retrieval_url(&self) -> String {
        let mut url = format!("ipfs://{}", self.cid);
        for segment in &self.path {
            url.push('/');
            url.extend(utf8_percent_encode(segment, PATH_SEGMENT));
        }
        url
    }

    /// Name used for content-type inference.
    pub fn file_name(&self) -> Option<&str> {
        self.path.last().map(String::as_str).or(self.filename.as_deref())
    }
}

/// Request headers forwarded upstream (everything but hop-by-hop ones).
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    forwarded.remove(HOST);
    forwarded.remove(CONNECTION);
    forwarded.remove(CONTENT_LENGTH);
    forwarded
}

/// Serves verified content through the network client.
pub struct ContentGateway {
    handle: Arc<ClientHandle>,
}

impl ContentGateway {
    pub fn new(handle: Arc<ClientHandle>) -> Self {
        Self { handle }
    }

    /// Fetch the requested content and stream it back.
    ///
    /// The upstream status is passed through. `HEAD` requests get the same
    /// headers and an empty body.
    pub async fn serve(
        &self,
        request: &ContentRequest,
        method: &Method,
        headers: &HeaderMap,
    ) -> WorkerResult<Response> {
        let client = self.handle.acquire().await?;
        let url = request.retrieval_url();
        let fetched = client
            .fetch(&url, method, &forwardable_headers(headers))
            .await?;

        let mut response_headers = fetched.headers;
        response_headers.remove(CONNECTION);
        response_headers.remove(TRANSFER_ENCODING);
        response_headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(content_type_for_name(request.file_name())),
        );
        response_headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
        response_headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        response_headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        // A partial response keeps the upstream length of the requested range
        if let Some(size) = request.size
            && fetched.status == StatusCode::OK
        {
            response_headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        }

        tracing::debug!(url = %url, status = %fetched.status, "Serving content");

        let body = if method == Method::HEAD {
            Body::empty()
        } else {
            Body::from_stream(
                fetched
                    .body
                    .map_err(|e| std::io::Error::other(e.to_string())),
            )
        };

        let mut response = Response::new(body);
        *response.status_mut() = fetched.status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

/// Router fallback: serves intercepted content, 404 for everything else.
pub async fn intercept(State(state): State<WorkerState>, req: Request) -> Response {
    // Only the request head is needed; `Request` itself is not Sync
    let (parts, _body) = req.into_parts();

    let Some(parsed) = ContentRequest::from_uri(&parts.uri) else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };
    // A malformed intercepted path is a 400 whatever the method
    let request = match parsed {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };
    if parts.method != Method::GET && parts.method != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response();
    }

    match state
        .content
        .serve(&request, &parts.method, &parts.headers)
        .await
    {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

//! A fully prepared internal API request.
//!
//! Headers are attached once per call; the request is then replayed
//! unchanged for every attempt, so it owns its body as `Bytes`.

use bytes::Bytes;
use http::{HeaderMap, Method, Request, Uri};
use http_body_util::Full;

use crate::context::CallContext;

/// One logical request, cheap to clone per attempt.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    context: CallContext,
}

impl ApiRequest {
    pub fn new(method: Method, uri: Uri, context: CallContext) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            context,
        }
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn context(&self) -> &CallContext {
        &self.context
    }

    /// Materialize a hyper request for one attempt.
    pub fn to_http(&self) -> Request<Full<Bytes>> {
        let mut request = Request::new(Full::new(self.body.clone()));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.headers_mut() = self.headers.clone();
        request
    }
}

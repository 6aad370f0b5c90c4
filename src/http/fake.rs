//! In-memory [`Transport`] used by the unit tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use super::{
    ApiClient,
    transport::{Method, RawResponse, Request, Transport, TransportError},
};

pub const BASE_URL: &str = "http://kyc.test/api";

type Reply = Result<RawResponse, TransportError>;

/// Replies with canned responses registered per method and path.
///
/// Several replies registered on the same route are served in order and the
/// last one repeats. Unknown routes answer 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<Request>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, path: &str, response: RawResponse) -> &Self {
        self.push(method, path, Ok(response))
    }

    pub fn on_json(&self, method: Method, path: &str, value: serde_json::Value) -> &Self {
        self.on(method, path, RawResponse::json(200, &value))
    }

    pub fn fail(&self, method: Method, path: &str, message: &str) -> &Self {
        self.push(method, path, Err(TransportError(message.to_string())))
    }

    fn push(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Paths (relative to the API base) of the requests seen so far.
    pub fn paths(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, relative(&r.url)))
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        let wanted = format!("{method} {path}");
        self.paths().iter().filter(|p| **p == wanted).count()
    }

    pub fn client(self: &Arc<Self>) -> ApiClient {
        ApiClient::new(BASE_URL, self.clone()).with_token(Some("test-token".to_string()))
    }
}

fn relative(url: &str) -> &str {
    url.strip_prefix(BASE_URL).unwrap_or(url)
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: Request) -> Result<RawResponse, TransportError> {
        let key = (request.method, relative(&request.url).to_string());
        self.requests.lock().unwrap().push(request);

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Ok(RawResponse::json(
                404,
                &serde_json::json!({"status": 404, "error": "Not Found"}),
            )),
        }
    }
}

//! A wiremock-backed resumable upload sink.
//!
//! Mounts initiate, chunk, publish and metadata endpoints on a `MockServer`.
//! Chunk pushes are answered like a well-behaved sink (full confirmation,
//! finalizing on the last byte) unless a scripted reply is queued.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use relay_core::relay::{SinkClient, SinkCredentials, SinkEndpoints};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Id the sink assigns to every finalized upload.
pub const REMOTE_ID: &str = "remote-1";

/// A scripted answer for the next chunk push.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// Answer with this bare status.
    Status(u16),
    /// Answer 308 confirming bytes `0..=last`.
    Confirm(u64),
    /// Answer 308 without a Range header.
    ConfirmNothing,
}

/// One chunk push as the sink saw it.
#[derive(Debug, Clone)]
pub struct SeenPush {
    pub path: String,
    pub offset: u64,
    pub last: u64,
    pub total: u64,
    pub body: Vec<u8>,
}

impl SeenPush {
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.offset, self.last, self.total)
    }
}

#[derive(Debug, Default)]
struct SinkState {
    script: Mutex<VecDeque<Reply>>,
    pushes: Mutex<Vec<SeenPush>>,
    sessions: AtomicU32,
}

/// Handle to the mounted sink.
#[derive(Debug, Clone)]
pub struct ResumableSink {
    state: Arc<SinkState>,
    base: String,
}

impl ResumableSink {
    /// Mounts the sink endpoints on `server`.
    pub async fn mount(server: &MockServer, script: impl IntoIterator<Item = Reply>) -> Self {
        let state = Arc::new(SinkState {
            script: Mutex::new(script.into_iter().collect()),
            ..SinkState::default()
        });

        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(InitiateResponder(Arc::clone(&state)))
            .mount(server)
            .await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/session/\d+$"))
            .respond_with(ChunkResponder(Arc::clone(&state)))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/api/files/{REMOTE_ID}/permissions")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "p1"})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/api/files/{REMOTE_ID}")))
            .respond_with(MetadataResponder(Arc::clone(&state)))
            .mount(server)
            .await;

        Self {
            state,
            base: server.uri(),
        }
    }

    /// A client pointed at this sink.
    pub fn client(&self) -> SinkClient {
        SinkClient::new(
            SinkEndpoints::new(format!("{}/upload", self.base), format!("{}/api", self.base)),
            SinkCredentials::new("test-token"),
        )
    }

    pub fn pushes(&self) -> Vec<SeenPush> {
        self.state.pushes.lock().unwrap().clone()
    }

    pub fn content_ranges(&self) -> Vec<String> {
        self.pushes().iter().map(SeenPush::content_range).collect()
    }

    pub fn sessions_opened(&self) -> u32 {
        self.state.sessions.load(Ordering::SeqCst)
    }

    /// Rebuilds the stored object from the pushes of the last session,
    /// later writes overwriting earlier ones.
    pub fn assembled(&self) -> Vec<u8> {
        let pushes = self.pushes();
        let Some(last_session) = pushes.last().map(|p| p.path.clone()) else {
            return Vec::new();
        };
        let total = pushes.last().map_or(0, |p| p.total) as usize;
        let mut object = vec![0u8; total];
        for push in pushes.iter().filter(|p| p.path == last_session) {
            let start = push.offset as usize;
            object[start..start + push.body.len()].copy_from_slice(&push.body);
        }
        object
    }
}

struct InitiateResponder(Arc<SinkState>);

impl Respond for InitiateResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.0.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(200).insert_header("Location", format!("/session/{n}").as_str())
    }
}

struct ChunkResponder(Arc<SinkState>);

impl Respond for ChunkResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some((offset, last, total)) = request
            .headers
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
        else {
            return ResponseTemplate::new(400).set_body_string("bad Content-Range");
        };
        self.0.pushes.lock().unwrap().push(SeenPush {
            path: request.url.path().to_string(),
            offset,
            last,
            total,
            body: request.body.clone(),
        });

        match self.0.script.lock().unwrap().pop_front() {
            Some(Reply::Status(status)) => ResponseTemplate::new(status),
            Some(Reply::Confirm(confirmed)) => ResponseTemplate::new(308)
                .insert_header("Range", format!("bytes=0-{confirmed}").as_str()),
            Some(Reply::ConfirmNothing) => ResponseTemplate::new(308),
            None if last + 1 == total => ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": REMOTE_ID })),
            None => ResponseTemplate::new(308)
                .insert_header("Range", format!("bytes=0-{last}").as_str()),
        }
    }
}

struct MetadataResponder(Arc<SinkState>);

impl Respond for MetadataResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let size = self.0.pushes.lock().unwrap().last().map_or(0, |p| p.total);
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": REMOTE_ID,
            "mimeType": "application/pdf",
            "size": size.to_string(),
            "webViewLink": format!("https://sink.test/view/{REMOTE_ID}"),
            "webContentLink": format!("https://sink.test/dl/{REMOTE_ID}"),
        }))
    }
}

fn parse_content_range(value: &str) -> Option<(u64, u64, u64)> {
    let rest = value.strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?, total.parse().ok()?))
}

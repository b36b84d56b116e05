#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use viewbridge::proxy::{RawResponse, Request, Transport};
use viewbridge::{Error, OutputSink, Result, TagContext, TagInvocation, TagLibrary, Value};

/// A sink that records every chunk separately.
#[derive(Debug, Default)]
pub struct Chunks {
    pub chunks: Vec<String>,
    max: Option<usize>,
}

impl Chunks {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that fails after accepting `max` chunks.
    pub fn with_max(max: usize) -> Self {
        Self {
            chunks: Vec::new(),
            max: Some(max),
        }
    }

    pub fn joined(&self) -> String {
        self.chunks.concat()
    }
}

impl OutputSink for Chunks {
    fn write(&mut self, chunk: &str) -> Result<()> {
        if self.max.map_or(false, |max| self.chunks.len() >= max) {
            return Err(Error::custom("sink is full"));
        }
        self.chunks.push(chunk.to_owned());
        Ok(())
    }
}

/// A tag call seen by [`Tags`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub uri: String,
    pub name: String,
    pub attrs: Vec<(String, Value)>,
    pub has_body: bool,
}

/// A tag library that renders every tag as an XML element named after the
/// tag, with the attributes in order and the body as content.
///
/// The `fail` tag always fails and the `twice` tag runs its body twice.
#[derive(Debug, Clone, Default)]
pub struct Tags {
    pub calls: Arc<Mutex<Vec<Call>>>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl TagLibrary for Tags {
    fn invoke(&self, tag: &TagInvocation<'_>, cx: &mut TagContext<'_>) -> Result<()> {
        self.calls.lock().unwrap().push(Call {
            uri: tag.uri().to_owned(),
            name: tag.name().to_owned(),
            attrs: tag
                .attrs()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            has_body: cx.has_body(),
        });

        match tag.name() {
            "fail" => Err(Error::custom("tag failed on purpose")),
            "twice" => {
                cx.run_body()?;
                cx.run_body()
            }
            name => {
                let mut open = format!("<{name}");
                for (k, v) in tag.attrs() {
                    let v = match v {
                        Value::String(s) => s.clone(),
                        Value::Integer(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        _ => String::from("?"),
                    };
                    open.push_str(&format!(" {k}=\"{v}\""));
                }
                if cx.has_body() {
                    cx.write(&format!("{open}>"))?;
                    cx.run_body()?;
                    cx.write(&format!("</{name}>"))
                } else {
                    cx.write(&format!("{open}/>"))
                }
            }
        }
    }
}

/// A transport that records requests and answers with canned responses, in
/// order.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pub requests: Arc<Mutex<Vec<Request>>>,
    responses: Arc<Mutex<VecDeque<RawResponse>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, headers: &[(&str, &str)], body: &str) -> &Self {
        let status_text = match status {
            200 => "OK",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "",
        };
        self.responses.lock().unwrap().push_back(RawResponse {
            status,
            status_text: status_text.to_owned(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_owned(),
        });
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, request: Request) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::custom("connection refused"))
    }
}

/// Asserts the plain and the pretty error output.
#[track_caller]
pub fn assert_err(err: &Error, msg: &str, pretty: &str) {
    assert_eq!(err.message(), msg);
    assert_eq!(format!("{err:#}"), pretty.replace("MSG", msg));
}

//! Client side proxies for remote methods.
//!
//! A [`Proxy`] is built once from a base URL, a crumb and the names of the
//! methods exposed by the server. Calling a method serializes the arguments
//! as a JSON array and POSTs it to `{base_url}/{method}`.
//!
//! # Examples
//!
//! ```no_run
//! # #[cfg(feature = "http")]
//! # async fn example() -> viewbridge::Result<()> {
//! use std::sync::Arc;
//! use viewbridge::proxy::{Arg, HttpTransport, Proxy};
//!
//! let proxy = Proxy::new(
//!     "http://localhost:8080/job/$stapler/bound/1234",
//!     "crumb-token",
//!     ["start", "stop"],
//!     Arc::new(HttpTransport::new()),
//! );
//!
//! let handle = proxy.call(
//!     "start",
//!     vec![
//!         Arg::from(42),
//!         Arg::callback(|rsp| println!("started: {}", rsp.response_text())),
//!     ],
//! )?;
//! handle.await.ok();
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "http")]
mod transport;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio::task::JoinHandle;

#[cfg(feature = "http")]
pub use crate::proxy::transport::HttpTransport;
use crate::{Error, Result, Value};

/// The content type of a remote method invocation.
pub const CONTENT_TYPE: &str = "application/x-stapler-method-invocation;charset=UTF-8";

/// The header that carries the crumb.
pub const CRUMB_HEADER: &str = "Crumb";

/// A completion callback.
pub type Callback = Box<dyn FnOnce(Response) + Send + 'static>;

/// An argument to a remote method call.
pub enum Arg {
    /// A value that is serialized into the request body.
    Value(serde_json::Value),
    /// A callback, when this is the last argument it receives the response.
    Callback(Callback),
}

/// A POST request issued by a proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// The response to a [`Request`] as returned by a [`Transport`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Performs the requests issued by a proxy.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a POST request and return the response, whatever its status.
    async fn post(&self, request: Request) -> Result<RawResponse>;
}

/// The response passed to a callback.
pub struct Response {
    raw: RawResponse,
    object: OnceLock<Option<serde_json::Value>>,
}

/// A client side stand-in for a server object.
///
/// Cloning a proxy is cheap, clones share the same method table.
#[derive(Clone)]
pub struct Proxy {
    inner: Arc<Inner>,
}

struct Inner {
    crumb: String,
    /// Maps each method name to its endpoint URL.
    methods: BTreeMap<String, String>,
    transport: Arc<dyn Transport>,
}

impl Arg {
    /// Construct a callback argument.
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(Response) + Send + 'static,
    {
        Self::Callback(Box::new(f))
    }
}

impl From<serde_json::Value> for Arg {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Value(value.into())
    }
}

macro_rules! impl_arg_from {
    ($($ty:ty)+) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Self::Value(serde_json::Value::from(value))
                }
            }
        )+
    };
}

impl_arg_from! { bool i32 i64 u32 u64 f64 String &str }

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Callback(_) => f.write_str("Callback"),
        }
    }
}

impl Response {
    pub(crate) fn new(raw: RawResponse) -> Self {
        Self {
            raw,
            object: OnceLock::new(),
        }
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.raw.status
    }

    /// The HTTP status text, e.g. `OK`.
    pub fn status_text(&self) -> &str {
        &self.raw.status_text
    }

    /// The raw response body.
    pub fn response_text(&self) -> &str {
        &self.raw.body
    }

    /// Returns a response header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.raw.headers, name)
    }

    /// The response body parsed as JSON.
    ///
    /// Returns `None` when the response content type is not JSON or the body
    /// doesn't parse. The body is parsed at most once.
    pub fn response_object(&self) -> Option<&serde_json::Value> {
        self.object
            .get_or_init(|| {
                let is_json = self
                    .header("Content-Type")
                    .map_or(false, |ct| ct.to_ascii_lowercase().contains("json"));
                if !is_json {
                    return None;
                }
                match serde_json::from_str(&self.raw.body) {
                    Ok(object) => Some(object),
                    Err(err) => {
                        log::warn!("failed to parse JSON response: {err}");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// The response body parsed as JSON and converted to a [`Value`].
    pub fn response_value(&self) -> Option<Value> {
        self.response_object().cloned().map(Value::from)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.raw.status)
            .field("status_text", &self.raw.status_text)
            .finish_non_exhaustive()
    }
}

impl Proxy {
    /// Construct a new proxy exposing the given methods.
    pub fn new<I, S>(
        base_url: impl Into<String>,
        crumb: impl Into<String>,
        methods: I,
        transport: Arc<dyn Transport>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let base_url = base_url.into();
        let methods = methods
            .into_iter()
            .map(|name| {
                let name = name.into();
                let url = endpoint(&base_url, &name);
                (name, url)
            })
            .collect();
        Self {
            inner: Arc::new(Inner {
                crumb: crumb.into(),
                methods,
                transport,
            }),
        }
    }

    /// Returns the names of the methods.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.inner.methods.keys().map(String::as_str)
    }

    /// Returns whether the proxy exposes the method.
    pub fn has_method(&self, name: &str) -> bool {
        self.inner.methods.contains_key(name)
    }

    /// Call a remote method in the background.
    ///
    /// If the last argument is a callback it is invoked with the response
    /// once a successful response arrives. A response with a non-success
    /// status or a failed request is logged and dropped, the callback is
    /// never invoked.
    ///
    /// # Panics
    ///
    /// If called outside of a tokio runtime.
    pub fn call(&self, name: &str, args: Vec<Arg>) -> Result<JoinHandle<()>> {
        let (request, callback) = self.prepare(name, args)?;
        let inner = self.inner.clone();
        let name = name.to_owned();
        Ok(tokio::spawn(async move {
            match inner.send(&name, request).await {
                Ok(response) => {
                    if let Some(callback) = callback {
                        callback(response);
                    }
                }
                Err(err) => log::warn!("dropping response of remote method `{name}`: {err}"),
            }
        }))
    }

    /// Call a remote method and wait for the response.
    ///
    /// Unlike [`call`][Proxy::call] a non-success status is returned as an
    /// error. A trailing callback is still invoked on success, with a copy of
    /// the response.
    pub async fn invoke(&self, name: &str, args: Vec<Arg>) -> Result<Response> {
        let (request, callback) = self.prepare(name, args)?;
        let response = self.inner.send(name, request).await?;
        if let Some(callback) = callback {
            callback(Response::new(response.raw.clone()));
        }
        Ok(response)
    }

    fn prepare(&self, name: &str, mut args: Vec<Arg>) -> Result<(Request, Option<Callback>)> {
        let url = self
            .inner
            .methods
            .get(name)
            .ok_or_else(|| Error::remote(format!("undefined remote method `{name}`")))?;

        let callback = match args.pop() {
            Some(Arg::Callback(callback)) => Some(callback),
            Some(arg) => {
                args.push(arg);
                None
            }
            None => None,
        };

        let payload: Vec<serde_json::Value> = args
            .into_iter()
            .map(|arg| match arg {
                Arg::Value(value) => value,
                Arg::Callback(_) => serde_json::Value::Null,
            })
            .collect();

        let request = Request {
            url: url.clone(),
            headers: vec![
                ("Content-Type".to_owned(), CONTENT_TYPE.to_owned()),
                (CRUMB_HEADER.to_owned(), self.inner.crumb.clone()),
            ],
            body: serde_json::to_string(&payload)?,
        };
        Ok((request, callback))
    }
}

impl Inner {
    async fn send(&self, name: &str, request: Request) -> Result<Response> {
        log::debug!("calling remote method `{name}` at {}", request.url);
        let raw = self.transport.post(request).await?;
        if !(200..300).contains(&raw.status) {
            return Err(Error::remote(format!(
                "remote method `{name}` failed: {} {}",
                raw.status, raw.status_text
            )));
        }
        Ok(Response::new(raw))
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("methods", &self.inner.methods)
            .finish_non_exhaustive()
    }
}

/// Joins the base URL and the method name with exactly one `/`.
fn endpoint(base_url: &str, name: &str) -> String {
    if base_url.ends_with('/') {
        format!("{base_url}{name}")
    } else {
        format!("{base_url}/{name}")
    }
}

pub(crate) fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_single_slash() {
        assert_eq!(endpoint("http://x/app", "foo"), "http://x/app/foo");
        assert_eq!(endpoint("http://x/app/", "foo"), "http://x/app/foo");
    }

    #[test]
    fn response_object_needs_json_content_type() {
        let rsp = Response::new(RawResponse {
            status: 200,
            status_text: "OK".into(),
            headers: vec![("content-type".into(), "text/plain".into())],
            body: "{}".into(),
        });
        assert_eq!(rsp.response_object(), None);

        let rsp = Response::new(RawResponse {
            status: 200,
            status_text: "OK".into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: r#"{"a":1}"#.into(),
        });
        assert_eq!(rsp.response_object(), Some(&serde_json::json!({ "a": 1 })));
        assert_eq!(rsp.response_value(), Some(Value::from([("a", 1)])));
    }
}

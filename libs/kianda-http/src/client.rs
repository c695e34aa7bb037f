use std::future::Future;
use std::pin::Pin;
use std::task::Poll;

use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;
use tower::buffer::Buffer;
use tower::{BoxError, Service};

use crate::builder::HttpClientBuilder;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::request::RequestBuilder;
use crate::response::{HttpResponse, ResponseBody};

pub type StackFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

pub type BufferedStack = Buffer<Request<Full<Bytes>>, StackFuture>;

/// Shared by a client and every request builder it hands out.
#[derive(Clone)]
pub struct Dispatcher {
    stack: BufferedStack,
    body_limit: usize,
    transport: TransportSecurity,
}

impl Dispatcher {
    pub(crate) fn new(stack: BufferedStack, body_limit: usize, transport: TransportSecurity) -> Self {
        Self {
            stack,
            body_limit,
            transport,
        }
    }

    pub(crate) fn transport(&self) -> TransportSecurity {
        self.transport
    }

    /// Hand a finished request to the stack and wrap whatever comes back.
    pub(crate) async fn dispatch(
        &mut self,
        request: Request<Full<Bytes>>,
    ) -> Result<HttpResponse, HttpError> {
        self.reserve_slot().await?;
        let inner = self.stack.call(request).await.map_err(from_buffer)?;
        Ok(HttpResponse {
            inner,
            max_body_size: self.body_limit,
        })
    }

    /// A full buffer fails fast with [`HttpError::Overloaded`] instead of queueing.
    async fn reserve_slot(&mut self) -> Result<(), HttpError> {
        let stack = &mut self.stack;
        let ready = std::future::poll_fn(|cx| Poll::Ready(stack.poll_ready(cx))).await;
        match ready {
            Poll::Ready(Ok(())) => Ok(()),
            Poll::Ready(Err(err)) => Err(from_buffer(err)),
            Poll::Pending => Err(HttpError::Overloaded),
        }
    }
}

/// Errors raised inside the stack arrive boxed; any other error means the
/// buffer worker has stopped.
fn from_buffer(err: BoxError) -> HttpError {
    err.downcast::<HttpError>().map_or_else(
        |gone| {
            tracing::error!(error = %gone, "request buffer worker stopped");
            HttpError::ServiceClosed
        },
        |typed| *typed,
    )
}

/// HTTP client for JSON APIs.
///
/// Cheap to clone (clones share one connection pool and one buffer) and
/// `Send + Sync`. Requests are built with [`get`](Self::get),
/// [`post`](Self::post) and the other method helpers, then sent with
/// [`RequestBuilder::send`].
///
/// ```ignore
/// let client = HttpClient::builder().build()?;
/// let courses: Vec<Course> = client
///     .get("https://school.example.com/api/courses/")
///     .send()
///     .await?
///     .json()
///     .await?;
/// ```
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) dispatcher: Dispatcher,
}

impl HttpClient {
    /// Client with [`HttpClientConfig::default`](crate::HttpClientConfig::default).
    ///
    /// # Errors
    /// See [`HttpClientBuilder::build`].
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Start a request. `url` must be absolute; anything else fails with
    /// [`HttpError::InvalidUrl`] once the request is sent.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(self.dispatcher.clone(), method, url.to_owned())
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    #[must_use]
    pub fn transport_security(&self) -> TransportSecurity {
        self.dispatcher.transport()
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("body_limit", &self.dispatcher.body_limit)
            .field("transport", &self.dispatcher.transport)
            .finish_non_exhaustive()
    }
}

//! Tower layers used by the client stack.

mod default_headers;

pub use default_headers::{DefaultHeadersLayer, DefaultHeadersService};

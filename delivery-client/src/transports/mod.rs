//! Upload transport implementations

mod http;
pub mod mock;

pub use http::HttpTransport;
pub use mock::{MockReply, MockTransport};

pub mod http;
pub mod mock;
pub mod traits;

pub use http::HttpFetcher;
pub use mock::{ScriptedAgent, StreamsDocument};
pub use traits::Fetcher;

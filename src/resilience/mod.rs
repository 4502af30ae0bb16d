pub mod policy;
pub mod retry;

pub use policy::RetryPolicy;
pub use retry::{retry_transient, RetryExhausted};

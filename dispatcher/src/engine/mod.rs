//! Dispatch engine: concurrent rounds, retry rounds and the result stream

pub mod dispatch;
pub mod retry;
pub mod stream;

pub use stream::ResultStream;

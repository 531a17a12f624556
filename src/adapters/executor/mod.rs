//! Query executor adapters.

mod passthrough;

pub use passthrough::PassthroughExecutor;

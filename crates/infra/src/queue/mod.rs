//! Task queue adapters and the worker pool that drains them

pub mod memory;
pub mod worker;

pub use memory::InMemoryTaskQueue;
pub use worker::{WorkerPool, WorkerPoolConfig};

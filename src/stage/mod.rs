//! Native stage invocation.

mod invoker;

#[cfg(test)]
pub(crate) mod testing;

pub use invoker::{Invocation, ProcessRunner, StageRunner, StageStatus};

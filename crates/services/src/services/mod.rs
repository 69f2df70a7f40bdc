pub mod captions;
pub mod config;
pub mod content;
pub mod editron;
pub mod idea;
pub mod notify;
pub mod pipeline;
pub mod schedule;
pub mod social;
pub mod speech;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

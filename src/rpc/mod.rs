mod client;
mod source;

pub use client::{NodeClient, RpcError};
pub use source::{BlockEvents, ChainSource, Header};

mod client;
mod codec;
mod error;

pub use error::{Error, Result};

pub(crate) use client::{InvokeOptions, RpcClient};

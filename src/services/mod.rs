use std::{future::Future, pin::Pin};

pub mod auth;
pub mod storage;

/// Boxed `Send` future used by the store traits (repos, storage, key sets).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

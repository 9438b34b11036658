//! Blocking bridge onto DataFusion's async execution.
//!
//! The relational API is synchronous. Plans run on a shared multi-threaded
//! tokio runtime, or on the caller's runtime through `block_in_place` when
//! one is already running.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

use super::error::{QueryError, QueryResult};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn shared_runtime() -> QueryResult<&'static Runtime> {
    if let Some(rt) = RUNTIME.get() {
        return Ok(rt);
    }
    let rt = Builder::new_multi_thread()
        .thread_name("basketminer-query")
        .enable_all()
        .build()
        .map_err(|e| QueryError::Runtime(e.to_string()))?;
    // A racing caller may have won; either runtime is equivalent
    Ok(RUNTIME.get_or_init(|| rt))
}

/// Drive `future` to completion from synchronous code.
///
/// Fails on a current-thread tokio runtime, which cannot block in place.
pub(crate) fn block_on<F: Future>(future: F) -> QueryResult<F::Output> {
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Err(QueryError::Runtime(
                "relational queries cannot block a current-thread runtime".to_string(),
            )),
            _ => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
        },
        Err(_) => Ok(shared_runtime()?.block_on(future)),
    }
}

// Drive an async pull to completion from synchronous callers.
use std::future::Future;

use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tokio::task;

use crate::core::error::{Error, ErrorKind};

/// Blocks on futures, reusing the ambient tokio runtime when there is one.
///
/// Inside a multi-thread runtime the worker is handed off with `block_in_place`.
/// A current-thread runtime has no other worker to drive the future, so a
/// blocking call there fails with `NotSupported` instead of hanging.
/// Outside a runtime a current-thread runtime is built on first use and kept.
#[derive(Debug, Default)]
pub(crate) struct Blocker {
    runtime: Option<Runtime>,
}

impl Blocker {
    pub(crate) fn new() -> Self {
        Self { runtime: None }
    }

    pub(crate) fn block_on<F: Future>(&mut self, future: F) -> Result<F::Output, Error> {
        if let Ok(handle) = Handle::try_current() {
            return match handle.runtime_flavor() {
                RuntimeFlavor::CurrentThread => Err(Error::new(ErrorKind::NotSupported)
                    .with_message("blocking read inside a current-thread runtime; use read_async")),
                _ => Ok(task::block_in_place(|| handle.block_on(future))),
            };
        }

        let runtime = match &mut self.runtime {
            Some(runtime) => runtime,
            slot => slot.insert(
                Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|err| {
                        Error::new(ErrorKind::Io)
                            .with_message("failed to build blocking runtime")
                            .with_source(err)
                    })?,
            ),
        };
        Ok(runtime.block_on(future))
    }
}

impl Drop for Blocker {
    fn drop(&mut self) {
        // Dropping a runtime from async code panics; shutdown_background never blocks.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

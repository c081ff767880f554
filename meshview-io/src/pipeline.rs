//! Background loading
//!
//! Loads run on a tokio blocking pool so decoding never stalls the render
//! loop. Finished loads come back over a flume channel, tagged with whatever
//! ticket the caller submitted them with; after each send the waker is called
//! so an event loop can wake up and drain.

use crate::error::LoadError;
use crate::format::FileKind;
use crate::registry::{Asset, LoaderRegistry};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

type Waker = Arc<dyn Fn() + Send + Sync>;

/// A finished load
#[derive(Debug)]
pub struct LoadOutcome<T> {
    pub ticket: T,
    pub kind: FileKind,
    pub path: PathBuf,
    pub result: Result<Asset, LoadError>,
}

/// Worker pool plus result channel
pub struct LoadPipeline<T> {
    runtime: Runtime,
    registry: Arc<LoaderRegistry>,
    sender: flume::Sender<LoadOutcome<T>>,
    receiver: flume::Receiver<LoadOutcome<T>>,
    waker: Waker,
}

impl<T: Send + 'static> LoadPipeline<T> {
    /// Start the worker pool
    pub fn new(registry: LoaderRegistry) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(4)
            .thread_name("meshview-loader")
            .build()?;
        let (sender, receiver) = flume::unbounded();

        Ok(Self {
            runtime,
            registry: Arc::new(registry),
            sender,
            receiver,
            waker: Arc::new(|| {}),
        })
    }

    /// Call `waker` from the worker thread after every finished load
    pub fn with_waker(mut self, waker: impl Fn() + Send + Sync + 'static) -> Self {
        self.waker = Arc::new(waker);
        self
    }

    pub fn registry(&self) -> &LoaderRegistry {
        &self.registry
    }

    /// Queue a load. The outcome arrives later through [`LoadPipeline::drain`].
    pub fn submit(&self, ticket: T, kind: FileKind, path: PathBuf) {
        let registry = Arc::clone(&self.registry);
        let sender = self.sender.clone();
        let waker = Arc::clone(&self.waker);

        tracing::info!("Loading {} file {}", kind, path.display());
        self.runtime.spawn_blocking(move || {
            let result = catch_unwind(AssertUnwindSafe(|| registry.load(kind, &path)))
                .unwrap_or_else(|_| Err(panic_error(kind, &path)));

            if sender
                .send(LoadOutcome {
                    ticket,
                    kind,
                    path,
                    result,
                })
                .is_ok()
            {
                waker();
            }
        });
    }

    /// Every outcome that has arrived so far, in completion order
    pub fn drain(&self) -> Vec<LoadOutcome<T>> {
        self.receiver.try_iter().collect()
    }

    /// Block until the next outcome arrives or `timeout` elapses
    pub fn wait(&self, timeout: Duration) -> Option<LoadOutcome<T>> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

fn panic_error(kind: FileKind, path: &std::path::Path) -> LoadError {
    match kind {
        FileKind::Texture => LoadError::Texture {
            path: path.to_path_buf(),
            reason: "decoder panicked".to_string(),
        },
        model => LoadError::mesh(model.format_name(), path, "loader panicked"),
    }
}

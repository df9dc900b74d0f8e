use {
    base::log,
    std::{
        fmt,
        sync::{Arc, OnceLock},
    },
    tokio::sync::OnceCell,
};

/// Outcome of resolving a lazily loaded backend.
pub enum Resource<T> {
    Ready(Arc<T>),
    Unavailable,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        match self {
            Resource::Ready(value) => Resource::Ready(Arc::clone(value)),
            Resource::Unavailable => Resource::Unavailable,
        }
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Ready(_) => f.write_str("Ready"),
            Resource::Unavailable => f.write_str("Unavailable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Uninitialized,
    Ready,
    Unavailable,
}

type Loader<T> = Arc<dyn Fn() -> Result<T, String> + Send + Sync>;

/// A backend loaded on first use and shared by every session afterwards.
///
/// The loader runs at most once, on the blocking pool. Its outcome is kept
/// either way: a failed load is never retried. The outcome is recorded on the
/// blocking side, so a caller that is cancelled mid-load does not cause a
/// second attempt; the next caller waits for the running one instead.
pub struct ResourceCache<T> {
    kind: &'static str,
    cell: OnceCell<Option<Arc<T>>>,
    outcome: Arc<OnceLock<Option<Arc<T>>>>,
    loader: Loader<T>,
}

impl<T: Send + Sync + 'static> ResourceCache<T> {
    pub fn new(
        kind: &'static str,
        loader: impl Fn() -> Result<T, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            cell: OnceCell::new(),
            outcome: Arc::new(OnceLock::new()),
            loader: Arc::new(loader),
        }
    }

    /// A cache that is already resolved to `value`.
    pub fn ready(kind: &'static str, value: T) -> Self {
        let value = Arc::new(value);
        Self {
            kind,
            cell: OnceCell::new_with(Some(Some(Arc::clone(&value)))),
            outcome: Arc::new(OnceLock::from(Some(value))),
            loader: Arc::new(|| Err("already loaded".to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub async fn get_or_init(&self) -> Resource<T> {
        let slot = self
            .cell
            .get_or_init(|| async {
                let loader = Arc::clone(&self.loader);
                let outcome = Arc::clone(&self.outcome);
                let kind = self.kind;
                let load = move || {
                    outcome
                        .get_or_init(|| {
                            log::info!("loading {kind}");
                            match loader() {
                                Ok(value) => {
                                    log::info!("{kind} ready");
                                    Some(Arc::new(value))
                                }
                                Err(error) => {
                                    log::error!("{kind} unavailable: {error}");
                                    None
                                }
                            }
                        })
                        .clone()
                };
                match tokio::task::spawn_blocking(load).await {
                    Ok(value) => value,
                    Err(error) => {
                        log::error!("{kind} loader panicked: {error}");
                        None
                    }
                }
            })
            .await;
        match slot {
            Some(value) => Resource::Ready(Arc::clone(value)),
            None => Resource::Unavailable,
        }
    }

    /// Current state, without triggering a load.
    pub fn state(&self) -> ResourceState {
        let outcome = self.cell.get().or_else(|| self.outcome.get());
        match outcome {
            None => ResourceState::Uninitialized,
            Some(Some(_)) => ResourceState::Ready,
            Some(None) => ResourceState::Unavailable,
        }
    }
}

/// The two shared backends, built once by the binary (or by tests) and
/// turned into stages with `Backends::into_stages`.
pub struct Backends<D, M> {
    pub detector: Arc<ResourceCache<D>>,
    pub oracle: Arc<ResourceCache<M>>,
}

//! Request-scoped resource lifetimes.
//!
//! A [`ScopedProvider`] builds a fresh resource (typically a database session)
//! on every acquisition and records it on a [`ResourceScope`] together with the
//! function that releases it. A scope is created per logical operation and
//! handed down the call chain explicitly, so two operations running at the
//! same time never share a stack and can never observe or release each other's
//! resources.
//!
//! Release is strictly LIFO. Resources opt into the default release path by
//! implementing [`Closeable`]; providers built with
//! [`ScopedProvider::with_releaser`] use their own release function instead.
//!
//! ```ignore
//! let out = ResourceScope::run(|scope| async move {
//!     let session = provider.acquire(&scope).await?;
//!     // ... use the session ...
//!     Ok::<_, DbError>(())
//! })
//! .await;
//! ```

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

/// Capability for resources that can release themselves at scope exit.
#[async_trait]
pub trait Closeable: Send {
    /// Release the underlying resource. Must tolerate being called on an
    /// already-finished resource.
    async fn close(&mut self);
}

#[async_trait]
impl<T: Closeable + ?Sized> Closeable for Box<T> {
    async fn close(&mut self) {
        (**self).close().await;
    }
}

/// Builds a new resource for every acquisition.
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    type Resource: Send + 'static;
    type Error: Send + 'static;

    async fn create(&self) -> Result<Self::Resource, Self::Error>;
}

/// Shared handle to a scoped resource.
///
/// The scope keeps one handle for release; the acquirer locks the other for
/// exclusive use.
pub type Scoped<R> = Arc<Mutex<R>>;

type Releaser<R> = Arc<dyn for<'a> Fn(&'a mut R) -> BoxFuture<'a, ()> + Send + Sync>;

type Release = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct Entry {
    kind: &'static str,
    release: Release,
}

/// One stack of `(resource, releaser)` pairs belonging to a single logical
/// operation.
///
/// Cloning yields another handle to the same stack, so a scope can be stored
/// in request extensions and still be released by whoever created it.
#[derive(Clone, Default)]
pub struct ResourceScope {
    stack: Arc<Mutex<Vec<Entry>>>,
}

impl ResourceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with a fresh scope and release everything it acquired once the
    /// returned future completes.
    pub async fn run<F, Fut, T>(f: F) -> T
    where
        F: FnOnce(ResourceScope) -> Fut,
        Fut: Future<Output = T>,
    {
        let scope = Self::new();
        let output = f(scope.clone()).await;
        scope.release_all().await;
        output
    }

    async fn push<R: Send + 'static>(
        &self,
        resource: Scoped<R>,
        releaser: Releaser<R>,
        kind: &'static str,
    ) {
        let release: Release = Box::new(move || -> BoxFuture<'static, ()> {
            Box::pin(async move {
                match resource.try_lock() {
                    Ok(mut guard) => releaser(&mut *guard).await,
                    // Still borrowed by a live unit of work; dropping the last
                    // handle releases it through `Drop` instead.
                    Err(_) => tracing::warn!(kind, "Scoped resource still in use at release"),
                }
            })
        });
        self.stack.lock().await.push(Entry { kind, release });
    }

    /// Number of resources currently held by this scope.
    pub async fn len(&self) -> usize {
        self.stack.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Pop the most recently acquired resource and release it.
    ///
    /// Returns `false` (and does nothing) when the scope is empty.
    ///
    /// A resource still locked by its holder (for example an open unit of
    /// work) is popped without being closed; only a warning is logged. Its
    /// cleanup then falls to the holder, which for a unit of work is
    /// `Drop` discarding the session.
    pub async fn release_one(&self) -> bool {
        let entry = self.stack.lock().await.pop();
        match entry {
            Some(entry) => {
                tracing::debug!(kind = entry.kind, "Releasing scoped resource");
                (entry.release)().await;
                true
            }
            None => false,
        }
    }

    /// Release every resource on the scope, newest first.
    pub async fn release_all(&self) {
        while self.release_one().await {}
    }
}

impl fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceScope").finish_non_exhaustive()
    }
}

fn close_resource<R: Closeable>(resource: &mut R) -> BoxFuture<'_, ()> {
    resource.close()
}

/// Hands out a freshly built resource per acquisition and registers it on the
/// caller's [`ResourceScope`].
pub struct ScopedProvider<F: ResourceFactory> {
    factory: F,
    releaser: Releaser<F::Resource>,
}

impl<F> ScopedProvider<F>
where
    F: ResourceFactory,
    F::Resource: Closeable,
{
    /// Provider whose resources are released through [`Closeable::close`].
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            releaser: Arc::new(close_resource::<F::Resource>),
        }
    }
}

impl<F: ResourceFactory> ScopedProvider<F> {
    /// Provider with an explicit release function.
    pub fn with_releaser<G>(factory: F, releaser: G) -> Self
    where
        G: for<'a> Fn(&'a mut F::Resource) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        Self {
            factory,
            releaser: Arc::new(releaser),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Build a new resource and push it onto `scope`.
    pub async fn acquire(&self, scope: &ResourceScope) -> Result<Scoped<F::Resource>, F::Error> {
        let resource = Arc::new(Mutex::new(self.factory.create().await?));
        let kind = type_name::<F::Resource>();
        scope
            .push(Arc::clone(&resource), Arc::clone(&self.releaser), kind)
            .await;
        tracing::debug!(kind, "Acquired scoped resource");
        Ok(resource)
    }
}

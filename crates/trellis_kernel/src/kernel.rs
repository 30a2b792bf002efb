//! The bootstrap kernel.

use core::future::Future;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;
use trellis_container::{Container, ContainerError};
use trellis_inject::Injector;

use crate::config::merge_config;
use crate::error::KernelError;
use crate::options::KernelOptions;
use crate::plugin::{AddPluginOptions, Plugin};

type Loader = Box<dyn FnOnce(Injector) -> BoxFuture<'static, Result<(), ContainerError>> + Send>;

/// Owns the container and runs the registration pass.
///
/// The kernel is assembled in three steps:
///
/// 1. Plugins and loaders are added.
/// 2. [`boot`](Self::boot) registers every plugin's services, in the order
///    the plugins were added, then queues loaders on the container's
///    bootstrap barrier.
/// 3. [`ready`](Self::ready) waits for the loaders and checks the registry.
///
/// Resolutions issued between `boot` and `ready` already wait for the
/// loaders, so nothing observes a half-registered container.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use trellis_kernel::{Kernel, KernelOptions};
///
/// # futures::executor::block_on(async {
/// let mut kernel = Kernel::new(KernelOptions::new());
/// kernel.add_loader(|injector| async move {
///     injector
///         .container()
///         .register_value("greeting", String::from("hello"), Default::default());
///     Ok(())
/// });
///
/// kernel.boot(&json!({})).unwrap();
/// let greeting = kernel.container().resolve::<String>("greeting").await.unwrap();
/// assert_eq!(*greeting, "hello");
/// kernel.ready().await.unwrap();
/// # });
/// ```
pub struct Kernel {
    options: KernelOptions,
    container: Container,
    injector: Injector,
    plugins: IndexMap<String, Box<dyn Plugin>>,
    loaders: Vec<Loader>,
    booted: bool,
}

impl Kernel {
    /// Creates a kernel with a fresh container.
    #[must_use]
    pub fn new(options: KernelOptions) -> Self {
        let container = Container::new();
        let injector = Injector::new(container.clone());
        Self {
            options,
            container,
            injector,
            plugins: IndexMap::new(),
            loaders: Vec::new(),
            booted: false,
        }
    }

    /// Returns the kernel's options.
    #[must_use]
    pub fn options(&self) -> &KernelOptions {
        &self.options
    }

    /// Returns the container.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Returns the injector registering into [`container`](Self::container).
    #[must_use]
    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Returns whether [`boot`](Self::boot) was called.
    #[must_use]
    pub fn is_booted(&self) -> bool {
        self.booted
    }

    /// Returns the namespaces of the added plugins, in order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Adds a plugin.
    ///
    /// The plugin is skipped when `options` restricts it to environments
    /// that do not include the kernel's.
    ///
    /// # Errors
    ///
    /// - [`KernelError::DuplicatePlugin`] if the namespace is taken
    /// - [`KernelError::AlreadyBooted`] after [`boot`](Self::boot)
    pub fn add_plugin(
        &mut self,
        plugin: impl Plugin,
        options: AddPluginOptions,
    ) -> Result<&mut Self, KernelError> {
        if self.booted {
            return Err(KernelError::AlreadyBooted);
        }

        let namespace = options
            .namespace()
            .unwrap_or_else(|| plugin.namespace())
            .to_string();

        if !options.allows(self.options.env()) {
            tracing::debug!(
                plugin = plugin.name(),
                namespace = %namespace,
                env = %self.options.env(),
                "plugin disabled in this environment"
            );
            return Ok(self);
        }

        if self.plugins.contains_key(&namespace) {
            return Err(KernelError::DuplicatePlugin(namespace));
        }

        tracing::debug!(plugin = plugin.name(), namespace = %namespace, "plugin added");
        self.plugins.insert(namespace, Box::new(plugin));
        Ok(self)
    }

    /// Adds an asynchronous registration routine.
    ///
    /// Loaders run on the bootstrap barrier, one after another in the order
    /// they were added, once [`boot`](Self::boot) is called. They start when
    /// the barrier is first awaited, by a resolution or by
    /// [`ready`](Self::ready). A loader must not resolve from the container:
    /// resolutions wait for the barrier.
    pub fn add_loader<F, Fut>(&mut self, loader: F) -> &mut Self
    where
        F: FnOnce(Injector) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ContainerError>> + Send + 'static,
    {
        self.loaders
            .push(Box::new(move |injector| Box::pin(loader(injector))));
        self
    }

    /// Runs the registration pass.
    ///
    /// Installs tracing if configured, registers every plugin's services
    /// with its merged configuration, then queues the loaders.
    ///
    /// # Errors
    ///
    /// - [`KernelError::AlreadyBooted`] on a second call
    /// - the first error returned by a plugin
    pub fn boot(&mut self, app_config: &Value) -> Result<(), KernelError> {
        if self.booted {
            return Err(KernelError::AlreadyBooted);
        }
        self.booted = true;

        if let Some(subscriber) = self.options.tracing() {
            subscriber.install();
        }

        tracing::info!(
            env = %self.options.env(),
            debug = self.options.is_debug(),
            plugins = self.plugins.len(),
            loaders = self.loaders.len(),
            "booting kernel"
        );

        for (namespace, plugin) in &self.plugins {
            let config = match app_config.get(namespace) {
                Some(overrides) => merge_config(plugin.default_config(), overrides),
                None => plugin.default_config(),
            };
            tracing::debug!(plugin = plugin.name(), namespace = %namespace, "registering services");
            plugin.register_services(&self.injector, &config)?;
        }

        for (index, loader) in core::mem::take(&mut self.loaders).into_iter().enumerate() {
            let injector = self.injector.clone();
            self.container.pause_for(async move {
                tracing::debug!(loader = index, "running loader");
                loader(injector).await
            });
        }

        Ok(())
    }

    /// Waits for the loaders, then checks the registry.
    ///
    /// # Errors
    ///
    /// The first failing loader, or the first problem reported by
    /// [`Container::check_sanity`].
    pub async fn ready(&self) -> Result<(), KernelError> {
        self.container.settle().await?;
        self.container.check_sanity()?;
        tracing::info!(services = self.container.len(), "kernel ready");
        Ok(())
    }
}

impl core::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel")
            .field("options", &self.options)
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("loaders", &self.loaders.len())
            .field("booted", &self.booted)
            .finish_non_exhaustive()
    }
}

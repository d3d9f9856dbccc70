//! Explicit framework context.
//!
//! The [`Context`] owns the registry and the runtime options. Nothing is
//! global: callers construct a context, hand it built-in plugins, and call
//! [`Context::initialize`] once before resolving services.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{RegistryError, RegistryResult};
use crate::options::RuntimeOptions;
use crate::plugin::{Plugin, PluginInfo};
use crate::registry::ServiceRegistry;

/// Owner of the registry, the plugins and the runtime options.
#[derive(Default)]
pub struct Context {
    plugins: Vec<Box<dyn Plugin>>,
    registry: ServiceRegistry,
    initialized: bool,
    root_path: Option<PathBuf>,
    options: RuntimeOptions,
    plugin_infos: Vec<PluginInfo>,
    #[cfg(feature = "dynamic-plugins")]
    loaded: Vec<crate::plugin::LoadedPlugin>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("initialized", &self.initialized)
            .field("root_path", &self.root_path)
            .field("plugins", &self.plugin_infos)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create an uninitialized context without plugins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default root: `$QPIPE_ROOT`, else `~/.qpipe`.
    pub fn default_root() -> PathBuf {
        std::env::var("QPIPE_ROOT").map_or_else(
            |_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".qpipe")
            },
            PathBuf::from,
        )
    }

    /// Add a built-in plugin (builder style).
    #[must_use]
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Add a built-in plugin. After initialization the plugin registers
    /// immediately.
    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin>) -> RegistryResult<()> {
        if self.initialized {
            plugin.register(&mut self.registry)?;
            self.plugin_infos.push(PluginInfo::builtin(plugin.as_ref()));
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// Activate every plugin once. Later calls are no-ops.
    ///
    /// Plugins register into a fresh registry that replaces the context's
    /// only if every plugin succeeds, so a failed call leaves the context
    /// uninitialized and empty and may be retried.
    pub fn initialize(&mut self, root: impl AsRef<Path>) -> RegistryResult<()> {
        if self.initialized {
            debug!("Context already initialized, ignoring");
            return Ok(());
        }
        let root = root.as_ref().to_path_buf();

        let mut registry = ServiceRegistry::new();
        let mut infos = Vec::with_capacity(self.plugins.len());
        for plugin in &self.plugins {
            plugin.register(&mut registry)?;
            infos.push(PluginInfo::builtin(plugin.as_ref()));
        }
        self.load_dynamic_plugins(&root, &mut registry, &mut infos)?;
        self.registry = registry;
        self.plugin_infos = infos;

        info!(
            root = %root.display(),
            plugins = self.plugin_infos.len(),
            services = self.registry.len(),
            "Context initialized"
        );
        self.root_path = Some(root);
        self.initialized = true;
        Ok(())
    }

    // Libraries stay loaded for the life of the context, even after a failed
    // initialization, since providers they created may still be alive.
    #[cfg(feature = "dynamic-plugins")]
    fn load_dynamic_plugins(
        &mut self,
        root: &Path,
        registry: &mut ServiceRegistry,
        infos: &mut Vec<PluginInfo>,
    ) -> RegistryResult<()> {
        for plugin in crate::plugin::load_plugins_from(&root.join("plugins"))? {
            let registered = plugin.register(registry);
            infos.push(plugin.info());
            self.loaded.push(plugin);
            registered?;
        }
        Ok(())
    }

    #[cfg(not(feature = "dynamic-plugins"))]
    #[allow(clippy::unused_self)]
    fn load_dynamic_plugins(
        &mut self,
        root: &Path,
        _registry: &mut ServiceRegistry,
        _infos: &mut Vec<PluginInfo>,
    ) -> RegistryResult<()> {
        debug!(
            "Dynamic plugin loading disabled, skipping {}",
            root.join("plugins").display()
        );
        Ok(())
    }

    /// True once [`Context::initialize`] has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Root path given to [`Context::initialize`].
    pub fn root_path(&self) -> Option<&Path> {
        self.root_path.as_deref()
    }

    /// Metadata of every activated plugin.
    pub fn plugins(&self) -> &[PluginInfo] {
        &self.plugin_infos
    }

    /// The registry; fails before initialization.
    pub fn registry(&self) -> RegistryResult<&ServiceRegistry> {
        if self.initialized {
            Ok(&self.registry)
        } else {
            Err(RegistryError::NotInitialized)
        }
    }

    /// Mutable registry; fails before initialization.
    pub fn registry_mut(&mut self) -> RegistryResult<&mut ServiceRegistry> {
        if self.initialized {
            Ok(&mut self.registry)
        } else {
            Err(RegistryError::NotInitialized)
        }
    }

    /// Resolve `name` for capability `T`, failing on a miss.
    pub fn service<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> RegistryResult<Arc<T>> {
        self.registry()?.require_service::<T>(name)
    }

    /// Set a runtime option.
    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.set(key, value);
    }

    /// Read a runtime option.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key)
    }

    /// Remove a runtime option.
    pub fn unset_option(&mut self, key: &str) -> Option<String> {
        self.options.unset(key)
    }

    /// All runtime options.
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Forward the runtime options to every options contributor.
    pub fn handle_options(&self) -> RegistryResult<bool> {
        Ok(self.registry()?.handle_options(self.options.as_map()))
    }
}

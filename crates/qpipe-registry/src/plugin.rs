//! Plugin activators.
//!
//! A [`Plugin`] contributes providers to a [`ServiceRegistry`] when the
//! owning [`Context`](crate::Context) initializes. Built-in plugins are
//! handed to the context directly; with `--features dynamic-plugins`,
//! further plugins are loaded from shared libraries under
//! `<root>/plugins`.
//!
//! # Plugin Interface
//!
//! Shared libraries must export a constructor named `qpipe_plugin_create`
//! returning a boxed [`Plugin`] trait object.

#[cfg(feature = "dynamic-plugins")]
use crate::error::RegistryError;
use crate::error::RegistryResult;
use crate::registry::ServiceRegistry;

/// A bundle of capability providers.
pub trait Plugin: Send + Sync {
    /// Unique plugin name.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Add this plugin's providers to `registry`.
    fn register(&self, registry: &mut ServiceRegistry) -> RegistryResult<()>;
}

/// Metadata for an activated plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    /// Plugin name.
    pub name: String,
    /// Plugin description.
    pub description: String,
    /// Shared library path, for dynamically loaded plugins.
    pub library_path: Option<String>,
}

impl PluginInfo {
    pub(crate) fn builtin(plugin: &dyn Plugin) -> Self {
        Self {
            name: plugin.name().to_string(),
            description: plugin.description().to_string(),
            library_path: None,
        }
    }
}

/// Type signature of the constructor exported by plugin libraries.
///
// SAFETY: the returned pointer is a Rust trait object, so host and plugin
// must be built with the same compiler, allocator and codegen settings.
#[cfg(feature = "dynamic-plugins")]
#[allow(improper_ctypes_definitions)]
pub type PluginCreateFn = unsafe extern "C" fn() -> *mut dyn Plugin;

/// A plugin backed by a shared library.
#[cfg(feature = "dynamic-plugins")]
pub struct LoadedPlugin {
    plugin: Box<dyn Plugin>,
    _library: libloading::Library,
    path: String,
}

#[cfg(feature = "dynamic-plugins")]
impl LoadedPlugin {
    /// Load a plugin from a shared library path.
    ///
    /// # Safety
    ///
    /// The library must export `qpipe_plugin_create` with the signature of
    /// [`PluginCreateFn`]. Loading untrusted libraries is inherently unsafe.
    pub unsafe fn load(path: impl AsRef<std::path::Path>) -> RegistryResult<Self> {
        let path_str = path.as_ref().display().to_string();

        let library = unsafe {
            libloading::Library::new(path.as_ref()).map_err(|e| {
                RegistryError::Plugin(format!("Failed to load plugin '{path_str}': {e}"))
            })?
        };

        let create_fn: libloading::Symbol<PluginCreateFn> = unsafe {
            library.get(b"qpipe_plugin_create").map_err(|e| {
                RegistryError::Plugin(format!(
                    "Plugin '{path_str}' missing qpipe_plugin_create: {e}"
                ))
            })?
        };

        let raw_plugin = unsafe { create_fn() };
        if raw_plugin.is_null() {
            return Err(RegistryError::Plugin(format!(
                "Plugin '{path_str}' returned null from constructor"
            )));
        }

        let plugin = unsafe { Box::from_raw(raw_plugin) };

        Ok(Self {
            plugin,
            _library: library,
            path: path_str,
        })
    }

    /// Plugin metadata.
    pub fn info(&self) -> PluginInfo {
        PluginInfo {
            name: self.plugin.name().to_string(),
            description: self.plugin.description().to_string(),
            library_path: Some(self.path.clone()),
        }
    }

    /// Register the plugin's providers.
    pub fn register(&self, registry: &mut ServiceRegistry) -> RegistryResult<()> {
        self.plugin.register(registry)
    }
}

/// Load every shared library in `dir`. Libraries that fail to load are
/// logged and skipped.
#[cfg(feature = "dynamic-plugins")]
pub(crate) fn load_plugins_from(dir: &std::path::Path) -> RegistryResult<Vec<LoadedPlugin>> {
    use tracing::{debug, info, warn};

    if !dir.exists() {
        debug!("Plugin directory does not exist: {}", dir.display());
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| {
        RegistryError::Plugin(format!(
            "Failed to read plugin directory '{}': {e}",
            dir.display()
        ))
    })?;

    let mut loaded = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let extension = path.extension().and_then(|e| e.to_str());
        if !matches!(extension, Some("so" | "dylib" | "dll")) {
            continue;
        }

        match unsafe { LoadedPlugin::load(&path) } {
            Ok(plugin) => {
                let info = plugin.info();
                info!("Loaded plugin: {} from {}", info.name, path.display());
                loaded.push(plugin);
            }
            Err(e) => {
                warn!("Failed to load plugin '{}': {}", path.display(), e);
            }
        }
    }

    Ok(loaded)
}

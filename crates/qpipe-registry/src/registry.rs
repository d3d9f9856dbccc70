//! Capability registry.
//!
//! A [`ServiceRegistry`] stores providers grouped by capability, where a
//! capability is any `?Sized` trait-object type such as
//! `dyn Accelerator`. Each [`Provider`] is either shared (every lookup
//! returns the same instance) or cloneable (every lookup mints a fresh,
//! independently owned instance).

use std::any::{Any, TypeId, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, error};

use crate::error::{RegistryError, RegistryResult};
use crate::options::{OptionSpec, OptionsProvider};

type Mint<T> = Arc<dyn Fn() -> Arc<T> + Send + Sync>;

/// A registered implementation of capability `T`.
pub struct Provider<T: ?Sized> {
    name: Option<String>,
    instance: Arc<T>,
    mint: Option<Mint<T>>,
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            instance: Arc::clone(&self.instance),
            mint: self.mint.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("capability", &type_name::<T>())
            .field("name", &self.name)
            .field("cloneable", &self.mint.is_some())
            .finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Provider<T> {
    /// A named provider whose single instance is shared by every caller.
    pub fn shared(name: impl Into<String>, instance: Arc<T>) -> Self {
        Self {
            name: Some(name.into()),
            instance,
            mint: None,
        }
    }

    /// A named provider that mints a fresh instance for every lookup.
    pub fn cloneable<F>(name: impl Into<String>, mint: F) -> Self
    where
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        let instance = mint();
        Self {
            name: Some(name.into()),
            instance,
            mint: Some(Arc::new(mint)),
        }
    }

    /// A provider without an identity name. It is returned by
    /// [`ServiceRegistry::get_services`] but never matched by name.
    pub fn anonymous(instance: Arc<T>) -> Self {
        Self {
            name: None,
            instance,
            mint: None,
        }
    }

    /// Identity name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// True if lookups mint fresh instances.
    pub fn is_cloneable(&self) -> bool {
        self.mint.is_some()
    }

    /// The canonical instance owned by the registry.
    pub fn canonical(&self) -> Arc<T> {
        Arc::clone(&self.instance)
    }

    fn resolve(&self) -> Arc<T> {
        match &self.mint {
            Some(mint) => mint(),
            None => Arc::clone(&self.instance),
        }
    }
}

/// Providers of every capability, in registration order.
#[derive(Default)]
pub struct ServiceRegistry {
    services: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
    capabilities: BTreeMap<&'static str, usize>,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider of capability `T`.
    pub fn register<T: ?Sized + Send + Sync + 'static>(&mut self, provider: Provider<T>) {
        debug!(
            capability = type_name::<T>(),
            name = provider.name().unwrap_or("<anonymous>"),
            cloneable = provider.is_cloneable(),
            "Registering service"
        );
        let slot = self
            .services
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Vec::<Provider<T>>::new()));
        if let Some(list) = slot.downcast_mut::<Vec<Provider<T>>>() {
            list.push(provider);
            *self.capabilities.entry(type_name::<T>()).or_default() += 1;
        }
    }

    fn providers<T: ?Sized + Send + Sync + 'static>(&self) -> &[Provider<T>] {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref::<Vec<Provider<T>>>())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn find<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Option<&Provider<T>> {
        // Later registrations shadow earlier ones with the same name.
        self.providers::<T>()
            .iter()
            .rev()
            .find(|p| p.name() == Some(name))
    }

    /// True if a provider of `T` is named `name`.
    pub fn has_service<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> bool {
        self.find::<T>(name).is_some()
    }

    /// Resolve the provider of `T` named `name`.
    ///
    /// Cloneable providers mint a fresh instance; shared providers return
    /// the canonical one. A miss is logged and returned as `None`.
    pub fn get_service<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        match self.find::<T>(name) {
            Some(provider) => Some(provider.resolve()),
            None => {
                error!(
                    capability = type_name::<T>(),
                    "Invalid service name '{name}': no provider registered"
                );
                None
            }
        }
    }

    /// Like [`ServiceRegistry::get_service`] but a miss is a typed error.
    pub fn require_service<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> RegistryResult<Arc<T>> {
        self.get_service::<T>(name)
            .ok_or_else(|| RegistryError::ServiceNotFound {
                name: name.to_string(),
                capability: type_name::<T>(),
            })
    }

    /// Canonical instances of every provider of `T`, in registration order.
    pub fn get_services<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.providers::<T>().iter().map(Provider::canonical).collect()
    }

    /// Names of the identity-bearing providers of `T`.
    pub fn get_registered_ids<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<String> {
        self.providers::<T>()
            .iter()
            .filter_map(|p| p.name().map(str::to_string))
            .collect()
    }

    /// Option descriptors from every options contributor.
    pub fn get_registered_options(&self) -> Vec<OptionSpec> {
        self.get_services::<dyn OptionsProvider>()
            .iter()
            .flat_map(|p| p.options())
            .collect()
    }

    /// Forward `options` to every options contributor. True if any of them
    /// consumed something.
    pub fn handle_options(&self, options: &BTreeMap<String, String>) -> bool {
        // No short-circuit: every contributor sees the map.
        self.get_services::<dyn OptionsProvider>()
            .iter()
            .fold(false, |handled, p| p.handle_options(options) || handled)
    }

    /// Total number of providers.
    pub fn len(&self) -> usize {
        self.capabilities.values().sum()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

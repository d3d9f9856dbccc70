//! Plugin contributing the `ibm` accelerator.

use std::fmt;
use std::sync::Arc;

use qpipe_hal::{Accelerator, RemoteAccelerator, RestClient};
use qpipe_registry::{Plugin, Provider, RegistryResult, ServiceRegistry};
use tracing::warn;

use crate::backend::IbmBackend;

/// Registers one shared `ibm` accelerator.
///
/// By default requests go over HTTP; [`IbmPlugin::with_client`] substitutes
/// another transport.
#[derive(Default, Clone)]
pub struct IbmPlugin {
    client: Option<Arc<dyn RestClient>>,
}

impl fmt::Debug for IbmPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IbmPlugin")
            .field("custom_client", &self.client.is_some())
            .finish()
    }
}

impl IbmPlugin {
    /// Plugin using the HTTP transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Plugin whose accelerator talks through `client`.
    pub fn with_client(client: Arc<dyn RestClient>) -> Self {
        Self {
            client: Some(client),
        }
    }
}

impl Plugin for IbmPlugin {
    fn name(&self) -> &str {
        "ibm"
    }

    fn description(&self) -> &str {
        "Remote accelerator over the QObject job protocol"
    }

    fn register(&self, registry: &mut ServiceRegistry) -> RegistryResult<()> {
        let accelerator = match &self.client {
            Some(client) => RemoteAccelerator::new(IbmBackend::new(), Arc::clone(client)),
            None => match RemoteAccelerator::with_http(IbmBackend::new()) {
                Ok(acc) => acc,
                Err(e) => {
                    warn!("Skipping 'ibm' accelerator: {e}");
                    return Ok(());
                }
            },
        };
        registry.register(Provider::<dyn Accelerator>::shared(
            "ibm",
            Arc::new(accelerator) as Arc<dyn Accelerator>,
        ));
        Ok(())
    }
}

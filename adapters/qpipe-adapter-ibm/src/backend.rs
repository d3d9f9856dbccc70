//! QObject job protocol.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use qpipe_compile::{QObjectCompiler, QObjectResult, hex_to_bitstring};
use qpipe_hal::{
    AcceleratorBuffer, AcceleratorConfig, HalError, HalResult, Headers, RemoteAccelerator,
    RemoteBackend,
};
use qpipe_ir::Function;
use qpipe_registry::parse_option;
use tracing::{debug, warn};

/// Default service endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.quantum-computing.ibm.com";

/// Default target device.
pub const DEFAULT_DEVICE: &str = "ibmq_qasm_simulator";

/// Register size when the device width is not configured.
pub const DEFAULT_N_QUBITS: usize = 32;

const JOBS_PATH: &str = "/v1/jobs";

/// [`RemoteAccelerator`] over the QObject protocol.
pub type IbmAccelerator = RemoteAccelerator<IbmBackend>;

#[derive(Clone)]
struct IbmSettings {
    endpoint: String,
    token: Option<String>,
    device: String,
    shots: u64,
    n_qubits: usize,
}

impl Default for IbmSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            device: DEFAULT_DEVICE.to_string(),
            shots: qpipe_compile::DEFAULT_SHOTS,
            n_qubits: DEFAULT_N_QUBITS,
        }
    }
}

/// Backend half of the `ibm` accelerator.
///
/// Kernels are POSTed as one QObject envelope. The service either answers
/// with the result document directly or with a job id, in which case the
/// results are fetched from `/v1/jobs/{id}/results`.
#[derive(Default)]
pub struct IbmBackend {
    settings: RwLock<IbmSettings>,
}

impl fmt::Debug for IbmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = self.settings();
        f.debug_struct("IbmBackend")
            .field("endpoint", &settings.endpoint)
            .field("token", &settings.token.as_ref().map(|_| "[REDACTED]"))
            .field("device", &settings.device)
            .field("shots", &settings.shots)
            .field("n_qubits", &settings.n_qubits)
            .finish()
    }
}

impl IbmBackend {
    /// Backend with default endpoint and device and no token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint.
    #[must_use]
    pub fn with_endpoint(self, endpoint: impl Into<String>) -> Self {
        self.write_settings(|s| s.endpoint = endpoint.into());
        self
    }

    /// Set the API token.
    #[must_use]
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.write_settings(|s| s.token = Some(token.into()));
        self
    }

    /// Set the target device.
    #[must_use]
    pub fn with_device(self, device: impl Into<String>) -> Self {
        self.write_settings(|s| s.device = device.into());
        self
    }

    /// Target device name.
    pub fn device(&self) -> String {
        self.settings().device
    }

    /// Shots per experiment.
    pub fn shots(&self) -> u64 {
        self.settings().shots
    }

    fn settings(&self) -> IbmSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write_settings(&self, update: impl FnOnce(&mut IbmSettings)) {
        update(&mut self.settings.write().unwrap_or_else(PoisonError::into_inner));
    }

    fn decode(
        result: &qpipe_compile::ExperimentResult,
        width: usize,
    ) -> HalResult<AcceleratorBuffer> {
        let name = &result.header.name;
        if !result.success {
            return Err(HalError::Execution(format!("experiment '{name}' failed")));
        }
        let mut out = AcceleratorBuffer::new(name.clone(), width);
        for (key, &count) in &result.data.counts {
            let bits = hex_to_bitstring(key, width)
                .map_err(|e| HalError::Execution(format!("experiment '{name}': {e}")))?;
            out.append_measurement_count(bits, count);
        }
        Ok(out)
    }
}

impl RemoteBackend for IbmBackend {
    fn name(&self) -> &str {
        "ibm"
    }

    fn description(&self) -> &str {
        "Remote QObject accelerator"
    }

    fn url(&self) -> String {
        self.settings().endpoint
    }

    fn post_path(&self) -> String {
        JOBS_PATH.to_string()
    }

    fn headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Content-Type".into(), "application/json".into());
        if let Some(token) = self.settings().token {
            headers.insert("Authorization".into(), format!("Bearer {token}"));
        }
        headers
    }

    fn initialize(&self, config: &AcceleratorConfig) -> HalResult<()> {
        let options = config.options();
        let device = options.get("backend").cloned();
        let shots = parse_option::<u64>(&options, "shots")?;
        let n_qubits = parse_option::<usize>(&options, "n-qubits")?;
        if shots == Some(0) {
            return Err(HalError::Configuration("shots must be positive".into()));
        }
        if n_qubits == Some(0) {
            return Err(HalError::Configuration("n-qubits must be positive".into()));
        }

        self.write_settings(|s| {
            if let Some(endpoint) = &config.endpoint {
                s.endpoint.clone_from(endpoint);
            }
            if let Some(token) = &config.token {
                s.token = Some(token.clone());
            }
            if let Some(device) = device {
                s.device = device;
            }
            if let Some(shots) = shots {
                s.shots = shots;
            }
            if let Some(n) = n_qubits {
                s.n_qubits = n;
            }
        });
        debug!(backend = ?self, "Initialized");
        Ok(())
    }

    fn default_buffer_size(&self) -> usize {
        self.settings().n_qubits
    }

    fn process_input(&self, buffer: &AcceleratorBuffer, functions: &[Function]) -> HalResult<String> {
        let settings = self.settings();
        if settings.token.is_none() {
            return Err(HalError::Configuration(
                "no API token configured for 'ibm'".into(),
            ));
        }

        let compiler = QObjectCompiler::new().with_backend(settings.device);
        let qobject = compiler
            .to_qobject(functions, settings.shots, buffer.size())
            .map_err(|e| HalError::Execution(format!("cannot marshal kernels: {e}")))?;
        Ok(serde_json::to_string(&compiler.envelope(qobject))?)
    }

    fn follow_up(&self, submission: &str) -> HalResult<Option<String>> {
        let value: serde_json::Value = serde_json::from_str(submission)?;
        if value.get("results").is_some() {
            return Ok(None);
        }
        let id = value
            .get("id")
            .or_else(|| value.get("job_id"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                HalError::Execution("submission response carries neither results nor a job id".into())
            })?;
        debug!(job_id = id, "Job accepted, fetching results");
        Ok(Some(format!("{JOBS_PATH}/{id}/results")))
    }

    fn process_response(
        &self,
        buffer: &AcceleratorBuffer,
        response: &str,
    ) -> HalResult<Vec<AcceleratorBuffer>> {
        let document: QObjectResult = serde_json::from_str(response)?;
        if !document.success {
            warn!(job_id = ?document.job_id, "Job reported failure");
            return Err(HalError::Execution(format!(
                "job {} failed",
                document.job_id.as_deref().unwrap_or("<unknown>")
            )));
        }

        let device = document
            .backend_name
            .clone()
            .unwrap_or_else(|| self.device());
        document
            .results
            .iter()
            .map(|result| {
                let mut out = Self::decode(result, buffer.size())?;
                out.add_extra_info("device", device.as_str());
                if let Some(id) = &document.job_id {
                    out.add_extra_info("job-id", id.as_str());
                }
                Ok(out)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpipe_compile::QObjectRoot;
    use qpipe_ir::{Instruction, Operation};

    fn bell() -> Function {
        let mut f = Function::new("bell");
        f.add_instruction(Instruction::op("H", [0], []));
        f.add_instruction(Instruction::op("CNOT", [0, 1], []));
        f.add_instruction(Operation::measure(0, 0));
        f.add_instruction(Operation::measure(1, 1));
        f
    }

    #[test]
    fn test_initialize_from_config() {
        let backend = IbmBackend::new();
        let config = AcceleratorConfig::new("ibm")
            .with_endpoint("http://localhost:9000")
            .with_token("secret")
            .with_extra("backend", "ibmq_lima")
            .with_extra("shots", 2048)
            .with_extra("n-qubits", 5);
        backend.initialize(&config).unwrap();

        assert_eq!(backend.url(), "http://localhost:9000");
        assert_eq!(backend.device(), "ibmq_lima");
        assert_eq!(backend.shots(), 2048);
        assert_eq!(backend.default_buffer_size(), 5);
        assert!(backend.is_valid_buffer_size(5));
        assert!(!backend.is_valid_buffer_size(6));
        assert_eq!(
            backend.headers().get("Authorization").map(String::as_str),
            Some("Bearer secret")
        );
    }

    #[test]
    fn test_initialize_rejects_bad_values() {
        let backend = IbmBackend::new();
        let zero = AcceleratorConfig::new("ibm").with_extra("shots", 0);
        assert!(matches!(
            backend.initialize(&zero),
            Err(HalError::Configuration(_))
        ));
        let garbage = AcceleratorConfig::new("ibm").with_extra("shots", "many");
        assert!(matches!(
            backend.initialize(&garbage),
            Err(HalError::Registry(_))
        ));
        assert_eq!(backend.shots(), qpipe_compile::DEFAULT_SHOTS);
    }

    #[test]
    fn test_debug_redacts_token() {
        let backend = IbmBackend::new().with_token("super-secret");
        let shown = format!("{backend:?}");
        assert!(shown.contains("[REDACTED]"));
        assert!(!shown.contains("super-secret"));
    }

    #[test]
    fn test_process_input_requires_token() {
        let buffer = AcceleratorBuffer::new("q", 2);
        let err = IbmBackend::new().process_input(&buffer, &[bell()]).unwrap_err();
        assert!(matches!(err, HalError::Configuration(_)));
    }

    #[test]
    fn test_process_input_envelope() {
        let backend = IbmBackend::new().with_token("t").with_device("ibmq_lima");
        let buffer = AcceleratorBuffer::new("q", 3);
        let body = backend.process_input(&buffer, &[bell(), bell()]).unwrap();

        let root: QObjectRoot = serde_json::from_str(&body).unwrap();
        assert_eq!(root.backend.name, "ibmq_lima");
        assert_eq!(root.qobject.experiments.len(), 2);
        assert_eq!(root.qobject.config.shots, qpipe_compile::DEFAULT_SHOTS);
        assert_eq!(root.qobject.config.n_qubits, 3);
        assert_eq!(root.qobject.config.memory_slots, 2);
    }

    #[test]
    fn test_follow_up() {
        let backend = IbmBackend::new();
        assert_eq!(backend.follow_up(r#"{"results": []}"#).unwrap(), None);
        assert_eq!(
            backend.follow_up(r#"{"id": "abc"}"#).unwrap().as_deref(),
            Some("/v1/jobs/abc/results")
        );
        assert_eq!(
            backend.follow_up(r#"{"job_id": "j7"}"#).unwrap().as_deref(),
            Some("/v1/jobs/j7/results")
        );
        assert!(matches!(
            backend.follow_up(r#"{"status": "QUEUED"}"#),
            Err(HalError::Execution(_))
        ));
        assert!(matches!(
            backend.follow_up("not json"),
            Err(HalError::Serialization(_))
        ));
    }

    #[test]
    fn test_process_response_decodes_hex_counts() {
        let response = r#"{
            "job_id": "j1",
            "backend_name": "ibmq_lima",
            "success": true,
            "results": [
                {"header": {"name": "bell"}, "shots": 100, "success": true,
                 "data": {"counts": {"0x0": 48, "0x3": 52}}},
                {"header": {"name": "flip"}, "shots": 10, "success": true,
                 "data": {"counts": {"0x1": 10}}}
            ]
        }"#;
        let buffer = AcceleratorBuffer::new("q", 2);
        let results = IbmBackend::new().process_response(&buffer, response).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name(), "bell");
        assert_eq!(results[0].measurement_counts().get("00"), Some(&48));
        assert_eq!(results[0].measurement_counts().get("11"), Some(&52));
        assert_eq!(results[1].measurement_counts().get("10"), Some(&10));
        assert_eq!(
            results[0].information("job-id").and_then(|v| v.as_str()),
            Some("j1")
        );
        assert_eq!(
            results[1].information("device").and_then(|v| v.as_str()),
            Some("ibmq_lima")
        );
    }

    #[test]
    fn test_process_response_failures() {
        let buffer = AcceleratorBuffer::new("q", 1);
        let backend = IbmBackend::new();

        let failed_job = r#"{"job_id": "j2", "success": false, "results": []}"#;
        assert!(matches!(
            backend.process_response(&buffer, failed_job),
            Err(HalError::Execution(_))
        ));

        let failed_experiment = r#"{"results": [{"header": {"name": "k"}, "success": false}]}"#;
        assert!(matches!(
            backend.process_response(&buffer, failed_experiment),
            Err(HalError::Execution(_))
        ));

        let too_wide = r#"{"results": [{"header": {"name": "k"}, "data": {"counts": {"0x2": 1}}}]}"#;
        assert!(matches!(
            backend.process_response(&buffer, too_wide),
            Err(HalError::Execution(_))
        ));
    }
}

//! Framework bootstrap, lookups and end-to-end runs.
//!
//! Remote runs use a canned transport registered by an extra plugin that
//! shadows the built-in `ibm` accelerator.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use qpipe::{Config, Framework, FrameworkError};
use qpipe_adapter_ibm::IbmPlugin;
use qpipe_hal::{Accelerator, HalResult, Headers, RestClient};
use qpipe_ir::{Function, Instruction, Operation};
use qpipe_registry::{Plugin, RegistryError};

fn bell() -> Function {
    let mut f = Function::new("bell");
    f.add_instruction(Instruction::op("H", [0], []));
    f.add_instruction(Instruction::op("CNOT", [0, 1], []));
    f.add_instruction(Operation::measure(0, 0));
    f.add_instruction(Operation::measure(1, 1));
    f
}

fn seeded_config(shots: u64) -> Config {
    let mut config = Config::default();
    config.options = BTreeMap::from([
        ("shots".to_string(), shots.to_string()),
        ("seed".to_string(), "3".to_string()),
    ]);
    config
}

#[test]
fn test_builtin_services() {
    let framework = Framework::bootstrap(Config::default()).unwrap();

    assert_eq!(framework.compiler("qobject").unwrap().name(), "qobject");
    assert_eq!(
        framework.ir_transformation("circuit-optimizer").unwrap().name(),
        "circuit-optimizer"
    );
    assert_eq!(framework.ir_provider("gate").unwrap().name(), "gate");
    assert!(framework.ir_generator("qft").is_ok());
    assert!(framework.embedding_algorithm("trivial").is_ok());
    assert!(framework.accelerator("local").is_ok());

    let names: Vec<_> = framework
        .context()
        .plugins()
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, vec!["compile", "decorators", "local", "ibm"]);
}

#[test]
fn test_missing_service_is_a_registry_error() {
    let framework = Framework::bootstrap(Config::default()).unwrap();
    let err = framework.compiler("quil").unwrap_err();
    assert!(matches!(
        err,
        FrameworkError::Registry(RegistryError::ServiceNotFound { .. })
    ));
    assert!(framework.decorated(framework.accelerator("local").unwrap(), &["nope"]).is_err());
}

#[test]
fn test_rejected_option_does_not_fail_bootstrap() {
    let mut config = Config::default();
    config.options.insert("circuit-opt-n-tries".into(), "0".into());
    // Rejected values are logged and leave the contributor unchanged.
    let framework = Framework::bootstrap(config).unwrap();
    assert_eq!(framework.context().option("circuit-opt-n-tries"), Some("0"));
}

#[test]
fn test_compile_translate_and_optimize() {
    let framework = Framework::bootstrap(Config::default()).unwrap();

    let mut kernel = bell();
    kernel.insert_instruction(1, Instruction::op("X", [1], [])).unwrap();
    kernel.insert_instruction(2, Instruction::op("X", [1], [])).unwrap();

    let optimizer = framework.ir_transformation("circuit-optimizer").unwrap();
    let optimized = optimizer.transform(&qpipe_ir::Ir::from(vec![kernel])).unwrap();
    let optimized = optimized.kernel(0).unwrap();
    assert_eq!(optimized.instructions(), bell().instructions());

    let wire = framework.translate(optimized, "qobject").unwrap();
    let ir = framework.compile(&wire, "qobject").unwrap();
    assert_eq!(ir.kernel_by_name("bell").unwrap().instructions(), bell().instructions());
}

#[tokio::test]
async fn test_decorated_local_run() {
    let mut config = seeded_config(100);
    config.options.insert("sampler-n-execs".into(), "3".into());
    let framework = Framework::bootstrap(config).unwrap();

    let local = framework.accelerator("local").unwrap();
    let acc = framework.decorated(local, &["improved-sampling"]).unwrap();
    assert_eq!(acc.stage_names(), vec!["improved-sampling"]);

    let mut buffer = acc.create_buffer_with_size("q", 2).unwrap();
    acc.execute(&mut buffer, &bell()).await.unwrap();
    assert_eq!(buffer.total_shots(), 300);
    assert_eq!(
        buffer.information("sampler-n-execs").and_then(|v| v.as_f64()),
        Some(3.0)
    );
}

#[tokio::test]
async fn test_runtime_option_update() {
    let mut framework = Framework::bootstrap(seeded_config(10)).unwrap();
    assert!(framework.set_option("shots", "25").unwrap());

    let local = framework.accelerator("local").unwrap();
    let mut buffer = local.create_buffer_with_size("q", 2).unwrap();
    local.execute(&mut buffer, &bell()).await.unwrap();
    assert_eq!(buffer.total_shots(), 25);
}

struct Canned {
    response: String,
    headers: Mutex<Vec<Headers>>,
}

#[async_trait]
impl RestClient for Canned {
    async fn post(&self, _url: &str, _path: &str, _body: &str, headers: &Headers) -> HalResult<String> {
        self.headers.lock().unwrap().push(headers.clone());
        Ok(self.response.clone())
    }

    async fn get(&self, _url: &str, _path: &str, _headers: &Headers) -> HalResult<String> {
        Ok(self.response.clone())
    }
}

#[tokio::test]
async fn test_remote_accelerator_from_yaml() {
    let yaml = r"
remote:
  timeout_seconds: 7
accelerators:
  ibm:
    token: yaml-token
    backend: ibmq_lima
    n-qubits: 5
";
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    let mut config = Config::from_file(file.path()).unwrap();
    config.apply_env([("QPIPE_TOKEN_IBM", "env-token")]).unwrap();

    let client = Arc::new(Canned {
        response: r#"{"results": [{"header": {"name": "bell"},
            "data": {"counts": {"0x0": 3, "0x3": 5}}}]}"#
            .to_string(),
        headers: Mutex::new(Vec::new()),
    });
    let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(IbmPlugin::with_client(
        Arc::clone(&client) as Arc<dyn RestClient>,
    ))];
    let framework = Framework::bootstrap_with(config, plugins).unwrap();

    let ibm = framework.accelerator("ibm").unwrap();
    assert!(ibm.is_remote());
    assert!(!ibm.is_valid_buffer_size(6));

    let mut buffer = ibm.create_buffer_with_size("q", 2).unwrap();
    ibm.execute(&mut buffer, &bell()).await.unwrap();
    assert_eq!(buffer.measurement_counts().get("11"), Some(&5));

    let sent = client.headers.lock().unwrap();
    assert_eq!(
        sent[0].get("Authorization").map(String::as_str),
        Some("Bearer env-token")
    );
}

use gpu_guard::core::config::{GuardConfig, QueryBackend};
use gpu_guard::core::ResolutionSource;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_config_default() {
    let config = GuardConfig::default();
    assert_eq!(config.token, "5080");
    assert!(config.gpu_index.is_none());
    assert!(!config.fallback_to_first);
    assert_eq!(config.query_backend, QueryBackend::NvidiaSmi);
    assert_eq!(config.device_order.as_deref(), Some("PCI_BUS_ID"));
}

#[test]
fn test_config_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    let config = GuardConfig {
        app_dir: PathBuf::from("/srv/genai"),
        token: "4090".into(),
        gpu_index: Some(1),
        workload_args: vec!["--listen".into(), "--port".into(), "8188".into()],
        query_backend: QueryBackend::Nvml,
        device_order: None,
        ..Default::default()
    };
    config.save(&path).unwrap();

    let loaded = GuardConfig::load(Some(&path)).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_file_uses_kebab_case_backend() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    GuardConfig::default().save(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"query_backend\": \"nvidia-smi\""));
}

#[test]
fn test_empty_file_gives_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "\n").unwrap();

    assert_eq!(GuardConfig::load(Some(&path)).unwrap(), GuardConfig::default());
}

#[test]
fn test_launch_plan_requires_app_layout() {
    let temp_dir = TempDir::new().unwrap();
    let app = temp_dir.path().join("app");
    fs::create_dir_all(app.join("venv/bin")).unwrap();
    fs::write(app.join("venv/bin/python"), "").unwrap();
    fs::write(app.join("main.py"), "").unwrap();

    let config = GuardConfig {
        app_dir: app.clone(),
        interpreter: PathBuf::from("venv/bin/python"),
        required_paths: vec![PathBuf::from("models/checkpoints")],
        ..Default::default()
    };

    let plan = config.launch_plan().unwrap();
    assert_eq!(plan.workload.working_dir.as_deref(), Some(app.as_path()));
    let missing: Vec<_> = plan.required_paths.iter().filter(|p| !p.exists()).collect();
    assert_eq!(missing, vec![&app.join("models/checkpoints")]);
}

#[test]
fn test_policy_carries_override() {
    let config = GuardConfig {
        token: " 5080 ".into(),
        gpu_index: Some(3),
        ..Default::default()
    };
    let policy = config.policy();
    assert_eq!(policy.token, "5080");
    assert_eq!(policy.override_index, Some(3));

    let resolution = gpu_guard::core::resolve(Ok(&[][..]), &policy).unwrap();
    assert_eq!(resolution.source, ResolutionSource::Override);
}

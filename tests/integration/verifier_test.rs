use super::support::{gpus, SimulatedProbe};
use gpu_guard::core::verifier::{interpret, PROBE_SCRIPT};
use gpu_guard::core::{probe_unrestricted, verify, ProbeExpectation, ProbeOutput, RestrictionState};
use gpu_guard::error::{GuardError, ProbePhase};

fn restricted_to(index: u32) -> RestrictionState {
    RestrictionState::for_index(index, "CUDA_VISIBLE_DEVICES", Some("PCI_BUS_ID"))
}

#[test]
fn test_verify_passes_when_restriction_holds() {
    let probe = SimulatedProbe::new(gpus(&["RTX 4090", "RTX 5080"]));
    let report = verify(&probe, &restricted_to(1), "5080").unwrap();
    assert!(report.passed);
    assert_eq!(report.phase, ProbePhase::Restricted);
    assert_eq!(report.identity(), Some("RTX 5080"));
}

#[test]
fn test_verify_two_visible_devices_is_unexpected_count() {
    let mut probe = SimulatedProbe::new(gpus(&["RTX 5080", "RTX 4090"]));
    probe.honor_restriction = false;

    let err = verify(&probe, &restricted_to(0), "5080").unwrap_err();
    assert!(matches!(err, GuardError::UnexpectedDeviceCount { observed: 2 }));
}

#[test]
fn test_verify_wrong_identity_is_mismatch() {
    let probe = SimulatedProbe::new(gpus(&["RTX 4090", "RTX 5080"]));
    let err = verify(&probe, &restricted_to(0), "5080").unwrap_err();
    match err {
        GuardError::IdentityMismatch { token, observed } => {
            assert_eq!(token, "5080");
            assert_eq!(observed, "RTX 4090");
        }
        other => panic!("expected IdentityMismatch, got {:?}", other),
    }
}

#[test]
fn test_identity_check_is_case_insensitive() {
    let probe = SimulatedProbe::new(gpus(&["NVIDIA GeForce RTX 5080"]));
    assert!(verify(&probe, &restricted_to(0), "geforce rtx").is_ok());
}

#[test]
fn test_unrestricted_and_restricted_failures_are_distinguished() {
    let mut probe = SimulatedProbe::new(gpus(&["RTX 5080"]));
    probe.backend_available = false;

    let unrestricted = probe_unrestricted(&probe).unwrap_err();
    let restricted = verify(&probe, &restricted_to(0), "5080").unwrap_err();

    assert!(matches!(
        unrestricted,
        GuardError::BackendUnavailable {
            phase: ProbePhase::Unrestricted,
            ..
        }
    ));
    assert_ne!(unrestricted.exit_code(), restricted.exit_code());
}

#[test]
fn test_restriction_to_absent_index_fails() {
    let probe = SimulatedProbe::new(gpus(&["RTX 5080"]));
    let err = verify(&probe, &restricted_to(4), "5080").unwrap_err();
    assert!(matches!(err, GuardError::UnexpectedDeviceCount { observed: 0 }));
}

#[test]
fn test_exit_code_wins_over_printed_success() {
    // Observations look fine but the probe itself reported a count mismatch
    let out = ProbeOutput {
        exit_code: Some(21),
        stdout: "backend_available=1\ndevice_count=1\ndevice_name=RTX 5080\n".into(),
        stderr: String::new(),
    };
    let err = interpret(
        ProbePhase::Restricted,
        &out,
        &ProbeExpectation::single_device("5080"),
    )
    .unwrap_err();
    assert!(matches!(err, GuardError::UnexpectedDeviceCount { .. }));
}

#[test]
fn test_probe_script_uses_documented_exit_codes() {
    assert!(PROBE_SCRIPT.contains("sys.exit(20)"));
    assert!(PROBE_SCRIPT.contains("sys.exit(21)"));
    assert!(PROBE_SCRIPT.contains("sys.exit(22)"));
    assert!(PROBE_SCRIPT.contains("GPU_GUARD_EXPECT_TOKEN"));
}

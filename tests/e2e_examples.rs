mod common;

#[cfg(feature = "e2e")]
use common::{CommandOutput, TestContext};

#[test]
#[cfg(all(feature = "e2e", unix))]
fn e2e_install_k9s_pinned_version() {
    let ctx = TestContext::new();

    let output: CommandOutput = ctx
        .cmd()
        .args(["install", "--version", "v0.32.5", "derailed/k9s"])
        .output()
        .expect("Failed to run azabox")
        .into();

    output.assert_success().assert_stdout_contains("Installed to");

    let versioned = ctx.bin_dir.join("k9s-v0.32.5");
    assert!(versioned.is_file());
    assert_eq!(std::fs::read_link(ctx.bin_dir.join("k9s")).unwrap(), versioned);

    let output: CommandOutput = std::process::Command::new(ctx.bin_dir.join("k9s"))
        .arg("version")
        .arg("--short")
        .output()
        .expect("Failed to run k9s")
        .into();
    output.assert_success().assert_stdout_contains("0.32.5");
}

#[test]
#[cfg(feature = "e2e")]
fn e2e_install_then_update_reports_newer_release() {
    let ctx = TestContext::new();

    let output: CommandOutput = ctx
        .cmd()
        .args(["install", "-V", "v0.32.4", "derailed/k9s"])
        .output()
        .expect("Failed to run azabox")
        .into();
    output.assert_success();

    let output: CommandOutput = ctx
        .cmd()
        .args(["update", "derailed/k9s"])
        .output()
        .expect("Failed to run azabox")
        .into();
    output
        .assert_success()
        .assert_stdout_contains("Updating derailed/k9s from v0.32.4 to");
}

#[test]
#[cfg(feature = "e2e")]
fn e2e_unknown_repository() {
    let ctx = TestContext::new();

    let output: CommandOutput = ctx
        .cmd()
        .args(["install", "azabox-does-not-exist/nothing-here"])
        .output()
        .expect("Failed to run azabox")
        .into();

    output.assert_success().assert_stdout_contains("not found");
}

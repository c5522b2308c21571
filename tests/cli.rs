use std::process::Command;

fn teller_command(prompt: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_teller"));
    cmd.arg(prompt)
        .env("RUST_LOG", "teller=info")
        .env("LOG_OUTPUT", "stderr")
        .env_remove("DISPATCH_MODE")
        .env_remove("RECORDS_PATH")
        .env_remove("OPENAI_API_KEY")
        .env_remove("HISTORY_LIMIT");
    cmd
}

#[test]
fn one_shot_trigger_is_answered_locally() {
    let output = teller_command("What is my account balance?")
        .env("MODEL_PROVIDER", "invalid")
        .env("CHAT_USERNAME", "Alice")
        .output()
        .expect("failed to run teller binary");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "lookup should not touch the provider; stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(stdout.trim(), "Your account balance is $2540.75.");
}

#[test]
fn one_shot_trigger_with_unknown_user_prints_not_found() {
    let output = teller_command("last transaction")
        .env("MODEL_PROVIDER", "invalid")
        .env("CHAT_USERNAME", "mallory")
        .output()
        .expect("failed to run teller binary");

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "User not found");
}

#[test]
fn unreadable_records_file_aborts_startup() {
    let dir = tempfile::tempdir().expect("failed to create temp directory");
    let output = teller_command("my balance")
        .env("RECORDS_PATH", dir.path().join("missing.json"))
        .output()
        .expect("failed to run teller binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Failed to read records file"),
        "expected records error on stderr:\n{stderr}"
    );
}

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const HEADER: &str = "files,naziv,koda,nazivdobavitelja,sifradobavitelja,davcnastevilkadobavitelja,stevilkaracuna,Node,datumizdajeracuna,leto,guid";

/// Command running in an empty directory with an empty certificate store, so no config file,
/// `.env` or certificate from the developer's machine leaks in.
fn earchive(dir: &TempDir) -> Command {
    let store = dir.path().join("certs");
    std::fs::create_dir_all(&store).expect("create cert store");
    let mut cmd = Command::cargo_bin("earchive").expect("Binary exists");
    cmd.current_dir(dir.path())
        .env("EARCHIVE_CERT_STORE", &store)
        .env("EARCHIVE_TEST_URL", "http://127.0.0.1:9")
        .env("EARCHIVE_PRODUCTION_URL", "http://127.0.0.1:9");
    cmd
}

fn write_manifest(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    write(&path, content).expect("Writing manifest failed");
    path
}

#[test]
fn missing_manifest_exits_with_input_error() {
    let dir = tempdir().unwrap();
    earchive(&dir)
        .args(["sendfromcsv", "-f", "nope.csv", "-c", "3B48F17B"])
        .assert()
        .code(4)
        .stdout(predicate::str::contains("doesn't exist"));
}

#[test]
fn manifest_with_wrong_extension_is_rejected() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path(), "list.txt", &format!("{HEADER}\n"));
    earchive(&dir)
        .arg("sendfromcsv")
        .arg("--file")
        .arg(&manifest)
        .args(["--certificate", "3B48F17B"])
        .assert()
        .code(4)
        .stdout(predicate::str::contains(".csv extension"));
}

#[test]
fn manifest_missing_columns_is_rejected_before_authentication() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path(), "list.csv", "files,naziv\n/a.pdf,Racun\n");
    // The certificate store is empty: reaching authentication would exit 6 instead.
    earchive(&dir)
        .arg("sendfromcsv")
        .arg("-f")
        .arg(&manifest)
        .args(["-c", "3B48F17B"])
        .assert()
        .code(4)
        .stdout(predicate::str::contains("exactly 11 columns"));
}

#[test]
fn manifest_without_rows_is_rejected() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path(), "list.csv", &format!("{HEADER}\n"));
    earchive(&dir)
        .arg("sendfromcsv")
        .arg("-f")
        .arg(&manifest)
        .args(["-c", "3B48F17B"])
        .assert()
        .code(4)
        .stdout(predicate::str::contains("doesn't contain any rows"));
}

#[test]
fn unreadable_manifest_exits_with_read_error() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path(), "list.csv", &format!("{HEADER}\na,b,c\n"));
    earchive(&dir)
        .arg("sendfromcsv")
        .arg("-f")
        .arg(&manifest)
        .args(["-c", "3B48F17B"])
        .assert()
        .code(22);
}

#[test]
fn unknown_certificate_exits_with_auth_error() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(
        dir.path(),
        "list.csv",
        &format!("{HEADER}\n/a.pdf,T,K,S,SC,1,INV,N1,2023-15-3,2023,\n"),
    );
    earchive(&dir)
        .arg("sendfromcsv")
        .arg("-f")
        .arg(&manifest)
        .args(["-c", "3B48F17B", "--devel"])
        .assert()
        .code(6)
        .stdout(predicate::str::contains("no certificate with serial number 3B48F17B"));
}

#[test]
fn single_send_with_missing_file_exits_with_input_error() {
    let dir = tempdir().unwrap();
    earchive(&dir)
        .args([
            "send",
            "-c",
            "3B48F17B",
            "-f",
            "missing.pdf",
            "--node",
            "N1",
            "--naziv",
            "Racun",
            "--koda",
            "R-1",
            "--nazivdobavitelja",
            "ACME",
            "--sifradobavitelja",
            "42",
            "--davcnastevilkadobavitelja",
            "12345678",
            "--stevilkaracuna",
            "2023-001",
            "--datumizdajeracuna",
            "2023-03-15",
            "--leto",
            "2023",
        ])
        .assert()
        .code(4)
        .stdout(predicate::str::contains("doesn't exist"));
}

#[test]
fn manifest_without_file_argument_exits_with_missing_argument() {
    let dir = tempdir().unwrap();
    earchive(&dir)
        .args(["sendfromcsv", "-c", "3B48F17B"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("no manifest file given"));
}

#[test]
fn missing_required_arguments_are_usage_errors() {
    let dir = tempdir().unwrap();
    earchive(&dir).arg("listnodes").assert().code(1);
    earchive(&dir).assert().code(1);
}

#[test]
fn help_is_not_an_error() {
    let dir = tempdir().unwrap();
    earchive(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sendfromcsv").and(predicate::str::contains("listnodes")));
}

#[test]
fn broken_config_file_is_a_usage_error() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("broken.yaml");
    write(&config, b"environments: [:::").unwrap();
    earchive(&dir)
        .arg("--config")
        .arg(&config)
        .args(["listnodes", "-c", "3B48F17B"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("parse"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let msg = format!("{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use earchive::cli::{run, Cli, Commands, ConnectionArgs};
    use earchive_core::exit_status::ExitStatus;

    // A config path that doesn't exist stops the run before any network access.
    let cli = Cli {
        config: Some(std::path::PathBuf::from("does-not-exist.yaml")),
        debug: false,
        command: Commands::ListNodes(ConnectionArgs {
            certificate: "3B48F17B".into(),
            devel: true,
        }),
    };

    let status = run(cli).await;
    assert_eq!(status, ExitStatus::UsageError);

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}

// Integration tests for the `worker` binary

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use tempfile::TempDir;

/// Kills the daemon when the test ends
struct Daemon(Child);

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn worker(home: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_worker"));
    // Keep any user config out of the test
    cmd.env("HOME", home.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Start `worker daemon` and return it with the port it printed
fn start_daemon(home: &TempDir, job_file: &std::path::Path) -> (Daemon, u16) {
    let mut child = worker(home)
        .arg("daemon")
        .arg("--bind")
        .arg("127.0.0.1:0")
        .arg("--job-file")
        .arg(job_file)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn daemon");

    let stdout = child.stdout.take().unwrap();
    let daemon = Daemon(child);

    let mut line = String::new();
    BufReader::new(stdout).read_line(&mut line).unwrap();
    let port = line
        .trim()
        .strip_prefix("WORKER_SERVER_PORT=")
        .expect("daemon should print its port")
        .parse()
        .unwrap();

    (daemon, port)
}

#[test]
fn test_tmpl_without_port_env_fails() {
    let home = TempDir::new().unwrap();
    let output = worker(&home)
        .env_remove("WORKER_SERVER_PORT")
        .args(["tmpl", "a", "b"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("WORKER_SERVER_PORT not found"));
}

#[test]
fn test_tmpl_with_invalid_port_fails() {
    let home = TempDir::new().unwrap();
    let output = worker(&home)
        .env("WORKER_SERVER_PORT", "not-a-port")
        .args(["tmpl", "a", "b"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot parse 'not-a-port' as a port number"));
}

#[test]
fn test_tmpl_connection_refused_prints_one_line() {
    let home = TempDir::new().unwrap();
    // Grab a free port, then release it
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let output = worker(&home)
        .env("WORKER_SERVER_PORT", port.to_string())
        .args(["tmpl", "a", "b"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.lines().count(), 1, "stderr: {}", stderr);
    assert!(stderr.starts_with("tmpl call failed"), "stderr: {}", stderr);
}

#[test]
fn test_tmpl_wrong_argument_count_fails() {
    let home = TempDir::new().unwrap();
    let output = worker(&home)
        .env("WORKER_SERVER_PORT", "1")
        .args(["tmpl", "only-one"])
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn test_tmpl_against_daemon() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let job_file = work.path().join("job.toml");
    std::fs::write(
        &job_file,
        r#"
            [[build_variables]]
            name = "cds.version"
            value = "2"

            [[build_variables]]
            name = "cds.stage"
            value = "build"

            [[parameters]]
            name = "cds.stage"
            value = "param"
        "#,
    )
    .unwrap();

    let source = work.path().join("myFile");
    let destination = work.path().join("outputFile");
    std::fs::write(&source, "version {{.cds.version}} stage {{.cds.stage}}\n").unwrap();

    let (_daemon, port) = start_daemon(&home, &job_file);

    let output = worker(&home)
        .env("WORKER_SERVER_PORT", port.to_string())
        .arg("tmpl")
        .arg(&source)
        .arg(&destination)
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(output.stdout.is_empty());
    assert_eq!(
        std::fs::read_to_string(&destination).unwrap(),
        "version 2 stage param\n"
    );

    // Missing source: non-zero exit with the daemon's message
    let output = worker(&home)
        .env("WORKER_SERVER_PORT", port.to_string())
        .arg("tmpl")
        .arg(work.path().join("missing"))
        .arg(work.path().join("other"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("tmpl failed: wrong request"), "stderr: {}", stderr);
    assert!(!work.path().join("other").exists());
}

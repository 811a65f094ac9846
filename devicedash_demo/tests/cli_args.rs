//! CLI arg parsing tests for devicedash_demo (server)
use std::process::Command;
use std::time::Duration;

fn wait_for_port(port: u16) -> bool {
    for _ in 0..40 {
        if std::net::TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn port_short_and_long_flags_bind() {
    // Unlikely ports to avoid conflicts.
    let exe = env!("CARGO_BIN_EXE_devicedash_demo");
    for args in [["--port", "9655"], ["-p", "9656"]] {
        let port: u16 = args[1].parse().unwrap();
        let mut child = Command::new(exe)
            .args(args)
            .args(["--sample-ms", "0"])
            .env("RUST_LOG", "warn")
            .spawn()
            .expect("spawn demo");
        let bound = wait_for_port(port);
        let _ = child.kill();
        let _ = child.wait();
        assert!(bound, "demo did not listen on {port}");
    }
}

#[test]
fn rejects_non_numeric_port() {
    assert_cmd::Command::cargo_bin("devicedash_demo")
        .unwrap()
        .args(["--port", "http"])
        .assert()
        .failure();
}

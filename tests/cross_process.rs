// Writer and reader in different processes over a shared ring.
//
// The test binary re-runs itself: the parent creates the ring and reads,
// the child (selected with `--exact child_writer --ignored`) attaches and
// writes. Run with: cargo test --test cross_process -- --nocapture
#![cfg(target_os = "linux")]

use metered_pipe::{PipeConfig, Reader, SharedChannel, Writer};
use serial_test::serial;
use std::env;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

const CHILD_RING: &str = "METERED_PIPE_CHILD_RING";
const CHILD_COUNT: &str = "METERED_PIPE_CHILD_COUNT";

#[test]
#[ignore = "spawned by reader_receives_from_child_process"]
fn child_writer() {
    let Ok(name) = env::var(CHILD_RING) else {
        return;
    };
    let count: u64 = env::var(CHILD_COUNT)
        .expect("count is set alongside the ring name")
        .parse()
        .expect("count is a number");

    let channel = SharedChannel::<u64>::attach(&name).expect("attach to parent ring");
    let mut writer = Writer::<u64>::new(Arc::new(channel), PipeConfig::default());
    for i in 0..count {
        writer.send(i).unwrap();
    }
    writer.close().unwrap();
}

#[test]
#[serial]
fn reader_receives_from_child_process() {
    const COUNT: u64 = 5_000;
    let name = format!("xproc_{}", std::process::id());

    let channel = SharedChannel::<u64>::create(&name, 256).unwrap();
    let mut reader = Reader::<u64>::new(Arc::new(channel));

    let consumer = thread::spawn(move || {
        let received: Vec<u64> = (0..COUNT).map(|_| reader.recv().unwrap()).collect();
        (reader, received)
    });

    let output = Command::new(env::current_exe().unwrap())
        .args(["child_writer", "--exact", "--ignored", "--nocapture", "--test-threads=1"])
        .env(CHILD_RING, &name)
        .env(CHILD_COUNT, COUNT.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "child writer failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let (mut reader, received) = consumer.join().unwrap();
    assert_eq!(received, (0..COUNT).collect::<Vec<_>>());
    assert_eq!(reader.received(), COUNT);

    let log = reader.drain_log();
    assert_eq!(log.len(), COUNT as usize);
    for record in &log {
        assert!(record.sent_at <= record.enqueued_at);
        assert!(record.fetch_started_at <= record.fetch_completed_at);
    }
    assert!(log
        .windows(2)
        .all(|pair| pair[0].fetch_completed_at <= pair[1].fetch_completed_at));
}

#[test]
#[serial]
fn attach_before_create_fails() {
    let name = format!("xproc_missing_{}", std::process::id());
    assert!(SharedChannel::<u64>::attach(&name).is_err());
}

// In demos/consumer.rs
//
// Cross-process demo, reader side. Attaches to the producer's ring, checks
// every hash, and prints a timing summary of the metering log.
use metered_pipe::{LogSummary, Reader, SharedChannel};
use sha2::{Digest, Sha256};
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

type Message = Option<(u64, String)>;

fn main() -> metered_pipe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let name = args.get(1).map(String::as_str).unwrap_or("demo");

    println!("Consumer: Waiting for ring '{}'...", name);

    // The producer may not have created the ring yet
    let deadline = Instant::now() + Duration::from_secs(5);
    let channel = loop {
        match SharedChannel::<Message>::attach(name) {
            Ok(channel) => break channel,
            Err(e) if Instant::now() < deadline => {
                tracing::debug!(%e, "ring not ready yet");
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                eprintln!("Failed to attach: {}", e);
                return Err(e);
            }
        }
    };
    println!("Consumer: Attached ({:?})", channel);

    let mut reader = Reader::<Message>::new(Arc::new(channel));
    let mut received = 0u64;
    let mut mismatched = 0u64;
    let start = Instant::now();

    while let Some((i, hash)) = reader.recv()? {
        let expected = format!("{:x}", Sha256::digest(format!("message_{}", i).as_bytes()));
        if hash != expected || i != received {
            eprintln!("Message {} failed verification", i);
            mismatched += 1;
        }
        received += 1;

        if received % 1000 == 0 {
            println!("--- Received {} messages ---", received);
        }
    }

    let elapsed = start.elapsed();
    println!(
        "Consumer: Received {} messages in {:.2?} ({:.2} messages/second)",
        received,
        elapsed,
        received as f64 / elapsed.as_secs_f64()
    );

    let records = reader.drain_log();
    let summary = LogSummary::from_records(&records);
    println!("Consumer: {} log records", summary.count);
    for (label, stats) in [
        ("enqueue delay", summary.enqueue_delay),
        ("transit", summary.transit),
        ("fetch wait", summary.fetch_wait),
        ("send-to-recv", summary.total),
    ] {
        println!(
            "  {:<14} mean {:>10.2?}  max {:>10.2?}",
            label, stats.mean, stats.max
        );
    }

    if mismatched == 0 {
        println!("All messages received successfully");
    }

    Ok(())
}

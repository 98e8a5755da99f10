// In demos/producer.rs
//
// Cross-process demo, writer side. Creates a shared ring, streams hashed
// messages through a metered pipe and ends with a `None` sentinel.
//
//   cargo run --example producer -- <num_messages> [channel_name]
//   cargo run --example consumer -- [channel_name]
use metered_pipe::{PipeConfig, SharedChannel, Writer};
use sha2::{Digest, Sha256};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

type Message = Option<(u64, String)>;

const CAPACITY: usize = 1024;

fn main() -> metered_pipe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <num_messages> [channel_name]", args[0]);
        std::process::exit(1);
    }

    let num_messages: u64 = args[1].parse().expect("Invalid number of messages");
    let name = args.get(2).map(String::as_str).unwrap_or("demo");

    println!("Producer: Precomputing {} hashes...", num_messages);
    let start_precompute = Instant::now();
    let hashes: Vec<String> = (0..num_messages)
        .map(|i| format!("{:x}", Sha256::digest(format!("message_{}", i).as_bytes())))
        .collect();
    println!(
        "Producer: Precomputed {} hashes in {:.2?}",
        num_messages,
        start_precompute.elapsed()
    );

    let channel = Arc::new(SharedChannel::<Message>::create(name, CAPACITY)?);
    let mut writer = Writer::<Message>::new(channel.clone(), PipeConfig::default());

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_for_handler = Arc::clone(&keep_running);

    // Handle Ctrl+C: stop sending, still flush and send the sentinel
    ctrlc::set_handler(move || {
        keep_running_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    println!("Producer: Created ring '{}' ({} slots)", name, CAPACITY);

    let start_send = Instant::now();
    for (i, hash) in hashes.into_iter().enumerate() {
        if !keep_running.load(Ordering::SeqCst) {
            println!("Producer: Interrupted after {} messages", i);
            break;
        }
        writer.send(Some((i as u64, hash)))?;
    }
    writer.send(None)?;
    writer.flush_blocking()?;

    let send_time = start_send.elapsed();
    let stats = writer.stats();
    println!(
        "Producer: Delivered {} messages in {} batches in {:.2?} ({} full attempts)",
        writer.delivered(),
        stats.batches,
        send_time,
        stats.full_attempts
    );
    println!(
        "Producer: Throughput: {:.2} messages/sec",
        writer.delivered() as f64 / send_time.as_secs_f64()
    );
    writer.close()?;

    // The ring disappears with this process; wait for the consumer to drain it.
    println!("Producer: Waiting for consumer to drain the ring...");
    while !channel.is_empty() && keep_running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(10));
    }

    println!("Producer: Shutting down");
    Ok(())
}

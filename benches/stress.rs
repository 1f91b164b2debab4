use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio_postgres::{Config, NoTls, SimpleQueryMessage};
use ulid::Ulid;

const HOUR: i64 = 3_600_000; // 1 hour in ms

async fn connect(host: &str, port: u16, dbname: &str) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(dbname)
        .user("slotguard")
        .password("slotguard");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

/// Register `n` resources and one client in the tenant behind `client`.
async fn seed(client: &tokio_postgres::Client, n: usize) -> (Vec<Ulid>, Ulid) {
    let mut resources = Vec::with_capacity(n);
    for i in 0..n {
        let rid = Ulid::new();
        client
            .batch_execute(&format!(
                "INSERT INTO resources (id, name) VALUES ('{rid}', 'provider {i}')"
            ))
            .await
            .unwrap();
        resources.push(rid);
    }
    let cid = Ulid::new();
    client
        .batch_execute(&format!("INSERT INTO clients (id) VALUES ('{cid}')"))
        .await
        .unwrap();
    (resources, cid)
}

fn insert_booking(rid: Ulid, cid: Ulid, start: i64, end: i64) -> String {
    format!(
        r#"INSERT INTO bookings (resource_id, client_id, start, "end") VALUES ('{rid}', '{cid}', {start}, {end})"#
    )
}

fn first_id(messages: &[SimpleQueryMessage]) -> Option<String> {
    messages.iter().find_map(|m| match m {
        SimpleQueryMessage::Row(row) => row.get("id").map(str::to_string),
        _ => None,
    })
}

async fn phase1_sequential(host: &str, port: u16) {
    let client = connect(host, port, &format!("bench_{}", Ulid::new())).await;
    let (resources, cid) = seed(&client, 1).await;
    let rid = resources[0];

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let s = (i as i64) * HOUR;
        let t = Instant::now();
        client
            .simple_query(&insert_booking(rid, cid, s, s + HOUR))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("admission latency", &mut latencies);
}

/// Many connections race for the same slots on one resource.
/// Every slot must be admitted exactly once.
async fn phase2_contention(host: &str, port: u16) {
    let dbname = format!("bench_{}", Ulid::new());
    let setup = connect(host, port, &dbname).await;
    let (resources, cid) = seed(&setup, 1).await;
    let rid = resources[0];

    let n_tasks = 16;
    let n_slots = 200;
    let admitted = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..n_tasks {
        let host = host.to_string();
        let dbname = dbname.clone();
        let admitted = admitted.clone();
        let rejected = rejected.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &dbname).await;
            for slot in 0..n_slots {
                let s = (slot as i64) * HOUR;
                match client.simple_query(&insert_booking(rid, cid, s, s + HOUR)).await {
                    Ok(_) => admitted.fetch_add(1, Ordering::Relaxed),
                    Err(_) => rejected.fetch_add(1, Ordering::Relaxed),
                };
            }
        }));
    }
    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let ok = admitted.load(Ordering::Relaxed);
    let refused = rejected.load(Ordering::Relaxed);
    println!(
        "  {n_tasks} connections x {n_slots} slots in {:.2}s: {ok} admitted, {refused} rejected",
        elapsed.as_secs_f64()
    );
    if ok != n_slots {
        println!("  !! expected exactly {n_slots} admissions");
    }
}

/// Independent resources on one tenant; admissions should not serialize.
async fn phase3_parallel_resources(host: &str, port: u16) {
    let dbname = format!("bench_{}", Ulid::new());
    let setup = connect(host, port, &dbname).await;
    let (resources, cid) = seed(&setup, 10).await;

    let n_per_task = 200;
    let start = Instant::now();
    let mut handles = Vec::new();
    for rid in resources.iter().copied() {
        let host = host.to_string();
        let dbname = dbname.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &dbname).await;
            let mut latencies = Vec::with_capacity(n_per_task);
            for i in 0..n_per_task {
                let s = (i as i64) * HOUR;
                let t = Instant::now();
                client
                    .simple_query(&insert_booking(rid, cid, s, s + HOUR))
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for h in handles {
        if let Ok(latencies) = h.await {
            all.extend(latencies);
        }
    }
    let elapsed = start.elapsed();
    let ops = all.len() as f64 / elapsed.as_secs_f64();
    println!(
        "  {} bookings over {} resources in {:.2}s = {ops:.0} ops/sec",
        all.len(),
        resources.len(),
        elapsed.as_secs_f64()
    );
    print_latency("admission latency", &mut all);
}

/// Create, reschedule, then cancel or complete, with window reads interleaved.
async fn phase4_lifecycle(host: &str, port: u16) {
    let client = connect(host, port, &format!("bench_{}", Ulid::new())).await;
    let (resources, cid) = seed(&client, 1).await;
    let rid = resources[0];

    let n = 500;
    let mut writes = Vec::with_capacity(n * 3);
    let mut reads = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let s = (i as i64) * 2 * HOUR;

        let t = Instant::now();
        let created = client
            .simple_query(&insert_booking(rid, cid, s, s + HOUR))
            .await
            .unwrap();
        writes.push(t.elapsed());
        let Some(id) = first_id(&created) else { continue };

        let t = Instant::now();
        client
            .simple_query(&format!(
                r#"INSERT INTO reschedules (booking_id, start, "end") VALUES ('{id}', {}, {})"#,
                s + HOUR,
                s + 2 * HOUR
            ))
            .await
            .unwrap();
        writes.push(t.elapsed());

        let transition = if i % 2 == 0 {
            format!("INSERT INTO status_changes (booking_id, status, reason) VALUES ('{id}', 'cancelled', 'bench')")
        } else {
            format!("INSERT INTO status_changes (booking_id, status) VALUES ('{id}', 'completed')")
        };
        let t = Instant::now();
        client.simple_query(&transition).await.unwrap();
        writes.push(t.elapsed());

        let t = Instant::now();
        client
            .simple_query(&format!(
                r#"SELECT * FROM bookings WHERE resource_id = '{rid}' AND start >= {s} AND "end" <= {}"#,
                s + 2 * HOUR
            ))
            .await
            .unwrap();
        reads.push(t.elapsed());
    }

    println!("  {n} lifecycles in {:.2}s", start.elapsed().as_secs_f64());
    print_latency("write latency", &mut writes);
    print_latency("window read latency", &mut reads);
}

#[tokio::main]
async fn main() {
    let host = std::env::var("SLOTGUARD_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("SLOTGUARD_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid SLOTGUARD_PORT");

    println!("=== slotguard stress benchmark ===");
    println!("target: {host}:{port}\n");

    // Each phase uses its own tenant (unique dbname) to avoid interference

    println!("[phase 1] sequential admission throughput");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] contended admissions on one resource");
    phase2_contention(&host, port).await;

    println!("\n[phase 3] parallel admissions across resources");
    phase3_parallel_resources(&host, port).await;

    println!("\n[phase 4] booking lifecycle with window reads");
    phase4_lifecycle(&host, port).await;

    println!("\n=== benchmark complete ===");
}

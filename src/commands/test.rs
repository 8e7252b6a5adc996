//! Test command implementation.
//!
//! Runs sampling iterations against the live process and prints the
//! resulting snapshots.

use anyhow::Result;
use std::time::Instant;

use herakles_proc_cpu_exporter::sampler::{platform_thread_stats, sample, ThreadStats};

/// Tests CPU sampling
pub fn command_test(iterations: usize, verbose: bool) -> Result<()> {
    println!("🧪 Herakles Process CPU Exporter - Test Mode");
    println!("=============================================");

    let stats = platform_thread_stats();

    for iteration in 1..=iterations {
        println!("\n🔄 Iteration {}/{}:", iteration, iterations);

        let start = Instant::now();

        if verbose {
            match stats.enumerate() {
                Ok(handles) => {
                    println!("   🧵 Found {} threads", handles.len());
                    for &handle in &handles {
                        match stats.read(handle) {
                            Ok(s) => {
                                println!(
                                    "   ├─ thread {}: user={:.3}s system={:.3}s usage={:.1}%{}",
                                    handle.0,
                                    s.user_seconds,
                                    s.system_seconds,
                                    s.usage_percent,
                                    if s.idle { " (idle)" } else { "" }
                                );
                            }
                            Err(e) => {
                                println!("   ├─ ❌ thread {}: {}", handle.0, e);
                            }
                        }
                    }
                    stats.release(&handles);
                }
                Err(e) => {
                    println!("   ❌ Enumeration failed: {}", e);
                }
            }
        }

        let snapshot = sample(&stats);
        let duration = start.elapsed();

        if snapshot.is_failure() {
            println!("   ❌ Sampling failed (enumeration error)");
        } else {
            println!("   📈 CPU totals:");
            println!("      ├─ user:   {:.3} s", snapshot.user_seconds);
            println!("      ├─ system: {:.3} s", snapshot.system_seconds);
            println!("      └─ usage:  {:.1} %", snapshot.usage_percent);
        }
        println!(
            "   ⏱️  Sample duration: {:.2}ms",
            duration.as_secs_f64() * 1000.0
        );
    }

    println!("\n✅ Test completed successfully");
    Ok(())
}

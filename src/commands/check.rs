//! Check command implementation.
//!
//! Validates that thread enumeration, per-thread stat reads and instrument
//! registration work on this host.

use anyhow::Result;
use prometheus::Registry;

use herakles_proc_cpu_exporter::collector::{
    CpuSamplerCollector, CPU_TIME_METRIC, CPU_UTILIZATION_METRIC,
};
use herakles_proc_cpu_exporter::sampler::{platform_thread_stats, sample, ThreadStats};

use crate::config::{validate_effective_config, Config};

/// Validates system requirements and configuration
pub fn command_check(
    threads: bool,
    instruments: bool,
    all: bool,
    config: &Config,
) -> Result<()> {
    println!("🔍 Herakles Process CPU Exporter - System Check");
    println!("================================================");

    let mut all_ok = true;

    // Check thread enumeration and reads
    if threads || all {
        println!("\n🧵 Checking thread statistics...");
        let stats = platform_thread_stats();

        match stats.enumerate() {
            Ok(handles) => {
                println!("   ✅ Enumerated {} threads", handles.len());

                let mut readable = 0usize;
                let mut failed = 0usize;
                for &handle in &handles {
                    match stats.read(handle) {
                        Ok(_) => readable += 1,
                        Err(_) => failed += 1,
                    }
                }
                stats.release(&handles);

                if readable > 0 {
                    println!("   ✅ Read stats for {} threads ({} failed)", readable, failed);
                } else {
                    println!("   ❌ Could not read stats for any thread");
                    all_ok = false;
                }
            }
            Err(e) => {
                println!("   ❌ Thread enumeration failed: {}", e);
                all_ok = false;
            }
        }

        let snapshot = sample(&stats);
        if snapshot.is_failure() {
            println!("   ❌ Sampling returned the failure sentinel");
            all_ok = false;
        } else {
            println!(
                "   ✅ Sample: user={:.3}s system={:.3}s usage={:.1}%",
                snapshot.user_seconds, snapshot.system_seconds, snapshot.usage_percent
            );
        }
    }

    // Check instrument registration and one collection cycle
    if instruments || all {
        println!("\n📊 Checking instruments...");
        let registry = Registry::new();
        match CpuSamplerCollector::for_current_process() {
            Ok(collector) => match collector.register(&registry) {
                Ok(()) => {
                    let families = registry.gather();
                    let has_time = families.iter().any(|f| f.get_name() == CPU_TIME_METRIC);
                    let has_util = families
                        .iter()
                        .any(|f| f.get_name() == CPU_UTILIZATION_METRIC);
                    if has_time && has_util {
                        println!("   ✅ Counter and gauge present after one collection cycle");
                    } else {
                        println!("   ⚠️  Instruments registered but empty (sampling failed?)");
                    }
                }
                Err(e) => {
                    println!("   ❌ Collector registration failed: {}", e);
                    all_ok = false;
                }
            },
            Err(e) => {
                println!("   ❌ Collector construction failed: {}", e);
                all_ok = false;
            }
        }
    }

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}

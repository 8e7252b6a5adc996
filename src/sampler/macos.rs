//! macOS thread statistics via the Mach thread APIs.
//!
//! `task_threads` hands out a kernel-allocated array of thread ports for the
//! current task; `thread_info` with the `THREAD_BASIC_INFO` flavor returns
//! each thread's accumulated user/system time, the scheduler's usage figure
//! (scaled by `TH_USAGE_SCALE`) and its flag word. The port array is copied
//! and deallocated inside `enumerate`; the ports themselves are the enduring
//! kernel resource and are dropped in `release`.

#![allow(non_camel_case_types)]

use std::mem;

use tracing::{debug, warn};

use super::{ThreadHandle, ThreadSample, ThreadStats, ThreadStatsError};

type kern_return_t = libc::c_int;
type integer_t = libc::c_int;
type natural_t = libc::c_uint;
type mach_port_t = natural_t;
type thread_act_t = mach_port_t;
type thread_flavor_t = natural_t;
type mach_msg_type_number_t = natural_t;
type vm_address_t = usize;
type vm_size_t = usize;

const KERN_SUCCESS: kern_return_t = 0;
const THREAD_BASIC_INFO: thread_flavor_t = 3;
/// Divisor converting the kernel's scaled usage figure to a 0..=1 fraction
/// of one core.
const TH_USAGE_SCALE: integer_t = 1000;
/// Flag bit marking an idle thread.
const TH_FLAGS_IDLE: integer_t = 0x2;

#[repr(C)]
#[derive(Clone, Copy)]
struct time_value_t {
    seconds: integer_t,
    microseconds: integer_t,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct thread_basic_info {
    user_time: time_value_t,
    system_time: time_value_t,
    cpu_usage: integer_t,
    policy: integer_t,
    run_state: integer_t,
    flags: integer_t,
    suspend_count: integer_t,
    sleep_time: integer_t,
}

const THREAD_BASIC_INFO_COUNT: mach_msg_type_number_t =
    (mem::size_of::<thread_basic_info>() / mem::size_of::<integer_t>()) as mach_msg_type_number_t;

extern "C" {
    static mach_task_self_: mach_port_t;

    fn task_threads(
        target_task: mach_port_t,
        act_list: *mut *mut thread_act_t,
        act_list_count: *mut mach_msg_type_number_t,
    ) -> kern_return_t;

    fn thread_info(
        target_act: thread_act_t,
        flavor: thread_flavor_t,
        thread_info_out: *mut integer_t,
        thread_info_out_count: *mut mach_msg_type_number_t,
    ) -> kern_return_t;

    fn vm_deallocate(
        target_task: mach_port_t,
        address: vm_address_t,
        size: vm_size_t,
    ) -> kern_return_t;

    fn mach_port_deallocate(task: mach_port_t, name: mach_port_t) -> kern_return_t;
}

/// Thread statistics source backed by the Mach thread APIs.
///
/// Handles are thread port names valid until `release` drops the port
/// rights.
pub struct MachThreadStats;

impl MachThreadStats {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MachThreadStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadStats for MachThreadStats {
    fn enumerate(&self) -> Result<Vec<ThreadHandle>, ThreadStatsError> {
        let task = unsafe { mach_task_self_ };
        let mut list: *mut thread_act_t = std::ptr::null_mut();
        let mut count: mach_msg_type_number_t = 0;

        let kr = unsafe { task_threads(task, &mut list, &mut count) };
        if kr != KERN_SUCCESS {
            return Err(ThreadStatsError::Enumerate(format!(
                "task_threads returned {}",
                kr
            )));
        }
        if list.is_null() || count == 0 {
            return Ok(Vec::new());
        }

        let handles = unsafe {
            std::slice::from_raw_parts(list, count as usize)
                .iter()
                .map(|&port| ThreadHandle(port as u64))
                .collect()
        };

        // The array itself is out-of-line kernel memory; drop it here so the
        // thread ports are the only resource left to release.
        let kr = unsafe {
            vm_deallocate(
                task,
                list as vm_address_t,
                count as vm_size_t * mem::size_of::<thread_act_t>(),
            )
        };
        if kr != KERN_SUCCESS {
            warn!("vm_deallocate of thread list returned {}", kr);
        }

        Ok(handles)
    }

    fn read(&self, handle: ThreadHandle) -> Result<ThreadSample, ThreadStatsError> {
        let mut info: thread_basic_info = unsafe { mem::zeroed() };
        let mut count = THREAD_BASIC_INFO_COUNT;

        let kr = unsafe {
            thread_info(
                handle.0 as thread_act_t,
                THREAD_BASIC_INFO,
                &mut info as *mut thread_basic_info as *mut integer_t,
                &mut count,
            )
        };
        if kr != KERN_SUCCESS {
            return Err(ThreadStatsError::Read(format!(
                "thread_info({}) returned {}",
                handle.0, kr
            )));
        }

        Ok(ThreadSample {
            idle: info.flags & TH_FLAGS_IDLE != 0,
            user_seconds: time_value_seconds(info.user_time),
            system_seconds: time_value_seconds(info.system_time),
            usage_percent: info.cpu_usage as f64 / TH_USAGE_SCALE as f64 * 100.0,
        })
    }

    fn release(&self, handles: &[ThreadHandle]) {
        let task = unsafe { mach_task_self_ };
        for handle in handles {
            let kr = unsafe { mach_port_deallocate(task, handle.0 as mach_port_t) };
            if kr != KERN_SUCCESS {
                debug!("mach_port_deallocate({}) returned {}", handle.0, kr);
            }
        }
    }
}

/// Converts a Mach time value to fractional seconds.
fn time_value_seconds(t: time_value_t) -> f64 {
    t.seconds as f64 + t.microseconds as f64 * 1e-6
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::sample;

    #[test]
    fn basic_info_count_matches_struct_layout() {
        // user_time + system_time are two integers each, plus six scalars.
        assert_eq!(THREAD_BASIC_INFO_COUNT, 10);
    }

    #[test]
    fn time_value_conversion_keeps_microseconds() {
        let t = time_value_t {
            seconds: 3,
            microseconds: 250_000,
        };
        assert!((time_value_seconds(t) - 3.25).abs() < 1e-9);
    }

    #[test]
    fn enumerates_the_current_process() {
        let stats = MachThreadStats::new();
        let handles = stats.enumerate().unwrap();
        assert!(!handles.is_empty());
        stats.release(&handles);
    }

    #[test]
    fn live_sample_is_a_real_measurement() {
        let stats = MachThreadStats::new();
        let snapshot = sample(&stats);
        assert!(!snapshot.is_failure());
        assert!(snapshot.user_seconds >= 0.0);
        assert!(snapshot.system_seconds >= 0.0);
        assert!(snapshot.usage_percent >= 0.0);
    }
}

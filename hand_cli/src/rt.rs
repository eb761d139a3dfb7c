//! Real-time scheduling for the actuation threads.
//!
//! Linux: memory locking, SCHED_FIFO and CPU pinning. macOS: memory locking
//! only. Every step is best effort; failures are logged and the hand keeps
//! running with normal scheduling.

use std::sync::OnceLock;

use crate::cli::{RtArgs, RtLock};

/// Apply the requested real-time settings once per process.
///
/// Must run before the loops are spawned: scheduling policy and affinity are
/// inherited by threads created afterwards.
pub fn setup_rt_once(args: &RtArgs) {
    static RT_ONCE: OnceLock<()> = OnceLock::new();
    if !args.rt {
        return;
    }
    let lock = args.rt_lock.unwrap_or_else(RtLock::os_default);
    RT_ONCE.get_or_init(|| {
        match apply_mem_lock(lock) {
            Ok(()) => tracing::info!(?lock, "rt: memory lock applied"),
            Err(e) => tracing::warn!(error = %e, ?lock, "rt: mlockall failed"),
        }
        #[cfg(target_os = "linux")]
        {
            match linux::apply_fifo(args.rt_prio) {
                Ok(prio) => tracing::info!(prio, "rt: SCHED_FIFO applied"),
                Err(e) => tracing::warn!(error = %e, "rt: SCHED_FIFO not applied"),
            }
            let cpu = args.rt_cpu.unwrap_or(0);
            match linux::pin_to_cpu(cpu) {
                Ok(()) => tracing::info!(cpu, "rt: pinned"),
                Err(e) => tracing::warn!(error = %e, cpu, "rt: affinity not applied"),
            }
        }
        #[cfg(not(target_os = "linux"))]
        tracing::warn!("rt: SCHED_FIFO and affinity are only available on Linux");
    });
}

#[cfg(unix)]
fn apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
    use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};

    fn lock_with(flags: libc::c_int) -> std::io::Result<()> {
        // SAFETY: mlockall takes no pointers and only affects this process.
        let rc = unsafe { mlockall(flags) };
        if rc != 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    let result = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => lock_with(MCL_CURRENT),
        // Fall back to resident pages when future locking is refused.
        RtLock::All => lock_with(MCL_CURRENT | MCL_FUTURE).or_else(|e| {
            if is_retryable(&e) {
                lock_with(MCL_CURRENT)
            } else {
                Err(e)
            }
        }),
    };
    result.map_err(|e| {
        let mut msg = format!("mlockall failed: {e}");
        if is_retryable(&e) {
            if let Some(limit) = memlock_limit() {
                msg.push_str(&format!("; {limit}"));
            }
            msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
        }
        eyre::eyre!(msg)
    })
}

#[cfg(not(unix))]
fn apply_mem_lock(_lock: RtLock) -> eyre::Result<()> {
    eyre::bail!("memory locking is not supported on this platform")
}

#[cfg(unix)]
fn is_retryable(err: &std::io::Error) -> bool {
    matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM)
}

#[cfg(unix)]
fn memlock_limit() -> Option<String> {
    let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
    // SAFETY: getrlimit writes a full rlimit into the provided buffer on success.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: rc == 0 means the buffer was initialised.
    let cur = unsafe { rlim.assume_init() }.rlim_cur;
    if cur == libc::RLIM_INFINITY {
        Some("memlock limit: unlimited".to_string())
    } else {
        Some(format!("memlock limit: {} KiB", cur / 1024))
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use libc::{CPU_ISSET, CPU_SET, CPU_ZERO, SCHED_FIFO, cpu_set_t};

    /// Capacity of cpu_set_t in CPU indices (bits).
    const MAX_CPUSET_BITS: usize = std::mem::size_of::<cpu_set_t>() * 8;

    /// Switch the process to SCHED_FIFO, clamping `prio` to the system range.
    pub fn apply_fifo(prio: Option<i32>) -> eyre::Result<i32> {
        // SAFETY: plain queries without pointers.
        let (min, max) = unsafe {
            (
                libc::sched_get_priority_min(SCHED_FIFO),
                libc::sched_get_priority_max(SCHED_FIFO),
            )
        };
        let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
        let prio = prio.unwrap_or(max).clamp(min, max);
        let param = libc::sched_param {
            sched_priority: prio,
        };
        // SAFETY: param outlives the call.
        let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            // SAFETY: geteuid cannot fail.
            let euid = unsafe { libc::geteuid() };
            eyre::bail!(
                "sched_setscheduler(SCHED_FIFO, {prio}) failed: {err} (euid {euid}); \
                 hint: run as root or grant CAP_SYS_NICE: 'sudo setcap cap_sys_nice=ep /path/to/hand'"
            );
        }
        Ok(prio)
    }

    /// Pin the process to `cpu` if the current affinity mask allows it.
    pub fn pin_to_cpu(cpu: usize) -> eyre::Result<()> {
        if cpu >= MAX_CPUSET_BITS {
            eyre::bail!("CPU {cpu} exceeds cpu_set_t capacity {MAX_CPUSET_BITS}");
        }
        // SAFETY: cpu_set_t is plain data; zeroed is a valid empty set.
        let mut allowed: cpu_set_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            CPU_ZERO(&mut allowed);
            libc::sched_getaffinity(0, std::mem::size_of::<cpu_set_t>(), &mut allowed)
        };
        if rc != 0 {
            eyre::bail!("sched_getaffinity failed: {}", std::io::Error::last_os_error());
        }
        // SAFETY: cpu is below the set capacity.
        if !unsafe { CPU_ISSET(cpu, &allowed) } {
            eyre::bail!("CPU {cpu} not permitted by current affinity mask");
        }
        let mut desired: cpu_set_t = unsafe { std::mem::zeroed() };
        // SAFETY: as above; desired outlives the call.
        let rc = unsafe {
            CPU_ZERO(&mut desired);
            CPU_SET(cpu, &mut desired);
            libc::sched_setaffinity(0, std::mem::size_of::<cpu_set_t>(), &desired)
        };
        if rc != 0 {
            eyre::bail!("sched_setaffinity failed: {}", std::io::Error::last_os_error());
        }
        Ok(())
    }
}

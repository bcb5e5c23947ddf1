//! Real-time scheduling helpers (Linux SCHED_FIFO + mlockall).
//!
//! The control loop stays correct without this; it only tightens jitter by
//! keeping the process resident and scheduled ahead of everything at normal
//! priority. Failures degrade to warnings.

#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool, prio: Option<i32>) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            eprintln!("Warning: mlockall failed: {err}; hint: check 'ulimit -l'");
        }

        let (min, max) = unsafe {
            let min = libc::sched_get_priority_min(libc::SCHED_FIFO);
            let max = libc::sched_get_priority_max(libc::SCHED_FIFO);
            if min < 0 || max < 0 { (1, 99) } else { (min, max) }
        };
        let param = libc::sched_param {
            sched_priority: prio.unwrap_or(max).clamp(min, max),
        };
        let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            eprintln!(
                "Warning: sched_setscheduler(SCHED_FIFO) failed: {err}; \
                 hint: needs CAP_SYS_NICE or root"
            );
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(rt: bool, _prio: Option<i32>) {
    if rt {
        eprintln!("Warning: SCHED_FIFO is not supported on this platform");
    }
}

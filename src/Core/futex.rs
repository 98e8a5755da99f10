// The signal word lives in a MAP_SHARED region, so these are shared
// (non-private) futexes: waiters and wakers may be in different processes.

use std::sync::atomic::AtomicU32;
use std::time::Duration;

/// Sleep while `*atomic == expected`, for at most `timeout` if given.
/// Spurious returns are allowed; callers re-check their condition.
#[cfg(target_os = "linux")]
pub fn futex_wait(atomic: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    use std::ptr;
    use std::sync::atomic::Ordering;

    // Check condition first to avoid syscall if possible
    if atomic.load(Ordering::Relaxed) != expected {
        return;
    }

    let ts = timeout.map(|t| libc::timespec {
        tv_sec: t.as_secs() as libc::time_t,
        tv_nsec: t.subsec_nanos() as libc::c_long,
    });
    let ts_ptr = ts
        .as_ref()
        .map_or(ptr::null(), |ts| ts as *const libc::timespec);

    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT,
            expected,
            ts_ptr,
            ptr::null::<u32>(),
            0u32,
        );
    }
}

/// Wake every waiter parked on `atomic`.
#[cfg(target_os = "linux")]
pub fn futex_wake(atomic: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE,
            i32::MAX,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait(_atomic: &AtomicU32, _expected: u32, _timeout: Option<Duration>) {
    // Fallback for non-Linux: busy wait with yield
    std::thread::yield_now();
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake(_atomic: &AtomicU32) {
    // No-op on non-Linux
}

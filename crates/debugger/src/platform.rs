//! Narrow capability interfaces over the OS primitives the guard needs.
//!
//! Apple targets deny attachment with `ptrace(PT_DENY_ATTACH)` and read the
//! `P_TRACED` flag through `sysctl(KERN_PROC_PID)`. Linux and Android use
//! `prctl(PR_SET_DUMPABLE, 0)` and the `TracerPid` field of
//! `/proc/self/status`. Everything else reports the primitive as unsupported.

use crate::signals::ProbeError;
use thiserror::Error;

/// Why attachment prevention could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreventionError {
    #[error("attachment prevention is not available on {0}")]
    Unsupported(&'static str),

    #[error("{primitive} failed: {detail}")]
    Denied {
        primitive: &'static str,
        detail: String,
    },
}

/// Asks the kernel to refuse debugger attachment.
pub trait TraceController: Send + Sync {
    fn deny_attachment(&self) -> Result<(), PreventionError>;
}

/// Read-only introspection of the current process.
pub trait ProcessInfoProvider: Send + Sync {
    /// Whether the kernel reports the process as traced.
    fn trace_state(&self) -> Result<bool, ProbeError>;

    fn parent_pid(&self) -> Result<u32, ProbeError>;

    /// Symbolised backtrace of the calling thread.
    fn stack_trace(&self) -> Result<String, ProbeError>;
}

/// [`TraceController`] backed by the host kernel
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformTraceController;

impl TraceController for PlatformTraceController {
    fn deny_attachment(&self) -> Result<(), PreventionError> {
        deny_attachment_impl()
    }
}

/// [`ProcessInfoProvider`] backed by the host kernel
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformProcessInfo;

impl ProcessInfoProvider for PlatformProcessInfo {
    fn trace_state(&self) -> Result<bool, ProbeError> {
        trace_state_impl()
    }

    fn parent_pid(&self) -> Result<u32, ProbeError> {
        parent_pid_impl()
    }

    fn stack_trace(&self) -> Result<String, ProbeError> {
        Ok(std::backtrace::Backtrace::force_capture().to_string())
    }
}

#[cfg(target_vendor = "apple")]
const PT_DENY_ATTACH: libc::c_int = 31;

#[cfg(target_vendor = "apple")]
fn deny_attachment_impl() -> Result<(), PreventionError> {
    // SAFETY: PT_DENY_ATTACH takes no address or data arguments.
    let ret = unsafe { libc::ptrace(PT_DENY_ATTACH, 0, std::ptr::null_mut::<libc::c_char>(), 0) };
    if ret != 0 {
        let errno = std::io::Error::last_os_error();
        // ENOTSUP is returned once the flag is already set.
        if errno.raw_os_error() != Some(libc::ENOTSUP) {
            return Err(PreventionError::Denied {
                primitive: "ptrace(PT_DENY_ATTACH)",
                detail: errno.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn deny_attachment_impl() -> Result<(), PreventionError> {
    // SAFETY: PR_SET_DUMPABLE only reads its integer arguments.
    let ret = unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) };
    if ret != 0 {
        return Err(PreventionError::Denied {
            primitive: "prctl(PR_SET_DUMPABLE)",
            detail: std::io::Error::last_os_error().to_string(),
        });
    }
    Ok(())
}

#[cfg(not(any(target_vendor = "apple", target_os = "linux", target_os = "android")))]
fn deny_attachment_impl() -> Result<(), PreventionError> {
    Err(PreventionError::Unsupported(std::env::consts::OS))
}

#[cfg(target_vendor = "apple")]
fn trace_state_impl() -> Result<bool, ProbeError> {
    // Raw kinfo_proc bytes; the libc crate no longer exposes the struct for
    // every Apple target. Layout of the 64-bit ABI.
    const KINFO_PROC_SIZE: usize = 648;
    const P_FLAG_OFFSET: usize = 32;
    const P_TRACED: i32 = 0x0000_0800;

    let mut mib: [libc::c_int; 4] = [
        libc::CTL_KERN,
        libc::KERN_PROC,
        libc::KERN_PROC_PID,
        // SAFETY: getpid has no preconditions.
        unsafe { libc::getpid() },
    ];
    let mut buf = [0u8; KINFO_PROC_SIZE];
    let mut size = KINFO_PROC_SIZE;

    // SAFETY: `buf` is writable for `size` bytes and `size` is updated in place.
    let ret = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            buf.as_mut_ptr().cast::<libc::c_void>(),
            &mut size,
            std::ptr::null_mut(),
            0,
        )
    };

    if ret != 0 {
        return Err(ProbeError::failed(
            "trace_state",
            std::io::Error::last_os_error(),
        ));
    }
    if size < P_FLAG_OFFSET + 4 {
        return Err(ProbeError::failed(
            "trace_state",
            format!("kinfo_proc truncated to {} bytes", size),
        ));
    }

    let p_flag = i32::from_ne_bytes([
        buf[P_FLAG_OFFSET],
        buf[P_FLAG_OFFSET + 1],
        buf[P_FLAG_OFFSET + 2],
        buf[P_FLAG_OFFSET + 3],
    ]);
    Ok(p_flag & P_TRACED != 0)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn trace_state_impl() -> Result<bool, ProbeError> {
    let status = std::fs::read_to_string("/proc/self/status")
        .map_err(|err| ProbeError::failed("trace_state", err))?;
    match parse_tracer_pid(&status) {
        Some(tracer_pid) => Ok(tracer_pid > 0),
        None => Err(ProbeError::failed(
            "trace_state",
            "TracerPid missing from /proc/self/status",
        )),
    }
}

#[cfg(not(any(target_vendor = "apple", target_os = "linux", target_os = "android")))]
fn trace_state_impl() -> Result<bool, ProbeError> {
    Err(ProbeError::Unsupported {
        probe: "trace_state",
    })
}

#[cfg(unix)]
fn parent_pid_impl() -> Result<u32, ProbeError> {
    // SAFETY: getppid has no preconditions and cannot fail.
    let ppid = unsafe { libc::getppid() };
    u32::try_from(ppid).map_err(|_| ProbeError::failed("parent_process", format!("ppid {}", ppid)))
}

#[cfg(not(unix))]
fn parent_pid_impl() -> Result<u32, ProbeError> {
    Err(ProbeError::Unsupported {
        probe: "parent_process",
    })
}

/// Extract `TracerPid` from the content of `/proc/<pid>/status`.
pub fn parse_tracer_pid(status: &str) -> Option<u32> {
    for line in status.lines() {
        let Some(raw) = line.strip_prefix("TracerPid:") else {
            continue;
        };
        return raw.trim().parse::<u32>().ok();
    }
    None
}

use std::process::Command;

/// Checks whether the current process can open a raw capture/send socket.
pub struct PermissionChecker;

impl PermissionChecker {
    /// True if running as root, or if the running binary carries
    /// `cap_net_raw` (checked via `getcap`, matching how the binary is
    /// typically granted capture rights without full root).
    pub fn has_capture_permissions() -> bool {
        if unsafe { libc::geteuid() } == 0 {
            return true;
        }

        let output = Command::new("getcap")
            .arg(
                std::env::current_exe()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .into_owned(),
            )
            .output();

        match output {
            Ok(output) => String::from_utf8_lossy(&output.stdout).contains("cap_net_raw"),
            Err(_) => false,
        }
    }
}

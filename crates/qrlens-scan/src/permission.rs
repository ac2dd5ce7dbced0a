//! Camera permission and host capability probing.
//!
//! On macOS the TCC (Transparency, Consent, and Control) database records
//! whether the hosting app may use the camera. Other platforms have no
//! queryable permission, so the state is reported as `Prompt` and the
//! camera open itself decides.

use qrlens_core::{HostCapabilities, PermissionState};
use std::env;

#[cfg(target_os = "macos")]
const TCC_DB_PATH: &str = "Library/Application Support/com.apple.TCC/TCC.db";

#[cfg(target_os = "macos")]
const CAMERA_SERVICE: &str = "kTCCServiceCamera";

/// Bundle ID and display name of the app TCC attributes camera use to.
///
/// A CLI inherits the permission of the terminal that launched it.
pub fn app_bundle_id() -> (&'static str, &'static str) {
    let term_program = env::var("TERM_PROGRAM").unwrap_or_default();
    bundle_id_for(&term_program)
}

fn bundle_id_for(term_program: &str) -> (&'static str, &'static str) {
    match term_program {
        "" => ("io.qrlens.cli", "qrlens"),
        "Apple_Terminal" => ("com.apple.Terminal", "Terminal"),
        "iTerm.app" => ("com.googlecode.iterm2", "iTerm2"),
        "vscode" => ("com.microsoft.VSCode", "VS Code"),
        "WarpTerminal" => ("dev.warp.Warp-Stable", "Warp"),
        "Alacritty" => ("io.alacritty", "Alacritty"),
        "WezTerm" => ("com.github.wez.wezterm", "WezTerm"),
        "ghostty" => ("com.mitchellh.ghostty", "Ghostty"),
        _ => ("com.apple.Terminal", "Terminal"),
    }
}

/// Map a TCC lookup onto a permission state.
fn state_from_record(record: Option<bool>) -> PermissionState {
    match record {
        Some(true) => PermissionState::Granted,
        Some(false) => PermissionState::Denied,
        None => PermissionState::Prompt,
    }
}

#[cfg(target_os = "macos")]
fn check_tcc_record() -> Result<Option<bool>, String> {
    use rusqlite::{Connection, OpenFlags};
    use std::path::PathBuf;

    let home = env::var("HOME").map_err(|_| "Could not find HOME directory".to_string())?;
    let db_path = PathBuf::from(home).join(TCC_DB_PATH);
    if !db_path.exists() {
        return Err("TCC.db not found".to_string());
    }

    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| format!("Failed to open TCC.db: {}", e))?;

    let (bundle_id, display_name) = app_bundle_id();
    let mut stmt = conn
        .prepare("SELECT auth_value FROM access WHERE client = ?1 AND service = ?2")
        .or_else(|_| conn.prepare("SELECT allowed FROM access WHERE client = ?1 AND service = ?2"))
        .map_err(|e| format!("Failed to prepare query: {}", e))?;

    let mut rows = stmt
        .query([bundle_id, CAMERA_SERVICE])
        .map_err(|e| format!("Failed to query: {}", e))?;

    match rows.next().map_err(|e| format!("Failed to read row: {}", e))? {
        Some(row) => {
            let value: i32 = row
                .get(0)
                .map_err(|e| format!("Failed to get permission value: {}", e))?;
            // auth_value 2 and legacy allowed 1 both mean granted.
            let allowed = value == 1 || value == 2;
            tracing::info!(
                "Camera permission for {} ({}): {}",
                display_name,
                bundle_id,
                if allowed { "ALLOWED" } else { "DENIED" }
            );
            Ok(Some(allowed))
        }
        None => {
            tracing::info!(
                "No camera permission record found for {} ({})",
                display_name,
                bundle_id
            );
            Ok(None)
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn check_tcc_record() -> Result<Option<bool>, String> {
    Ok(None)
}

/// Current camera permission. Unknown or unreadable records count as `Prompt`.
pub fn camera_permission() -> PermissionState {
    match check_tcc_record() {
        Ok(record) => state_from_record(record),
        Err(e) => {
            tracing::debug!("Could not check camera permission: {}", e);
            PermissionState::Prompt
        }
    }
}

/// Optional features available on this host.
///
/// Torch starts false; [`crate::CameraSource::host_capabilities`] fills it in
/// once a device is open.
pub fn probe_host_capabilities() -> HostCapabilities {
    HostCapabilities {
        torch: false,
        share: false,
        haptics: false,
        permission_query: cfg!(target_os = "macos"),
    }
}

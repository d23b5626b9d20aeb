//! Capability advertisement (§4.2 step 1): a worker's ordered list of
//! executor tags, most specific first, plus its name and hostname.

/// Builds the ordered capability list a worker advertises on every `Assign`
/// call. `host_tag` is the coarse executor tag (e.g. `"macos"`, `"linux"`);
/// `DEVICE_SN` contributes a more specific token ahead of it when set, since
/// the scheduler tries a worker's capabilities in order and stops at the
/// first match.
pub fn advertise(host_tag: &str) -> Vec<String> {
    let mut capabilities = Vec::new();
    if let Ok(serial) = std::env::var("DEVICE_SN") {
        if !serial.trim().is_empty() {
            capabilities.push(format!("deviceSN{}", serial.trim()));
        }
    }
    capabilities.push(host_tag.to_string());
    capabilities
}

/// Resolves the worker's own process-visible hostname, falling back to
/// `"unknown-host"` rather than failing startup over a cosmetic field.
pub fn hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// The coarse executor tag for the host this binary is running on.
pub fn host_executor_tag() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_sn_comes_before_host_tag() {
        std::env::set_var("DEVICE_SN", "ABC123");
        let caps = advertise("macos");
        assert_eq!(caps, vec!["deviceSNABC123".to_string(), "macos".to_string()]);
        std::env::remove_var("DEVICE_SN");
    }

    #[test]
    fn absent_device_sn_advertises_host_tag_only() {
        std::env::remove_var("DEVICE_SN");
        assert_eq!(advertise("linux"), vec!["linux".to_string()]);
    }
}

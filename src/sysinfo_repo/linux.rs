// Linux-specific helpers: /proc/stat ticks, /proc/cpuinfo, DMI.

use crate::models::CpuTicks;

/// Aggregate "cpu" line of /proc/stat. idle = idle + iowait; total sums
/// user..steal (guest time is already folded into user).
pub(super) fn parse_proc_stat(content: &str) -> Option<CpuTicks> {
    let line = content.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse::<u64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if fields.len() < 4 {
        return None;
    }
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    let total = fields.iter().sum();
    Some(CpuTicks { idle, total })
}

pub(super) fn read_proc_stat_ticks() -> Option<CpuTicks> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/stat").ok()?;
        return parse_proc_stat(&content);
    }
    #[cfg(not(target_os = "linux"))]
    None
}

/// Read first "model name" from /proc/cpuinfo. Preferred over sysinfo when it returns "cpu0" etc.
pub(super) fn read_cpu_model_linux() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        for line in content.lines() {
            if line.starts_with("model name") {
                let name = line
                    .find(": ")
                    .map(|i| line[i + 2..].trim())
                    .filter(|s| !s.is_empty() && *s != "cpu0")?;
                return Some(name.to_string());
            }
        }
    }
    None
}

fn read_dmi(field: &str) -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let v = std::fs::read_to_string(format!("/sys/class/dmi/id/{}", field)).ok()?;
        let v = v.trim();
        if v.is_empty() {
            return None;
        }
        return Some(v.to_string());
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = field;
        None
    }
}

pub(super) fn read_sys_vendor_linux() -> Option<String> {
    read_dmi("sys_vendor")
}

pub(super) fn read_product_name_linux() -> Option<String> {
    read_dmi("product_name")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_proc_stat_sums_first_eight_fields() {
        let content = "cpu  100 5 50 800 20 3 2 10 7 0\ncpu0 50 2 25 400 10 1 1 5 3 0\n";
        let t = parse_proc_stat(content).unwrap();
        assert_eq!(t.idle, 820);
        assert_eq!(t.total, 100 + 5 + 50 + 800 + 20 + 3 + 2 + 10);
    }

    #[test]
    fn parse_proc_stat_accepts_short_lines() {
        let t = parse_proc_stat("cpu 10 0 10 80\n").unwrap();
        assert_eq!(t, CpuTicks { idle: 80, total: 100 });
    }

    #[test]
    fn parse_proc_stat_rejects_missing_or_garbled_line() {
        assert!(parse_proc_stat("intr 1 2 3\n").is_none());
        assert!(parse_proc_stat("cpu a b c d\n").is_none());
        assert!(parse_proc_stat("cpu 1 2\n").is_none());
    }
}

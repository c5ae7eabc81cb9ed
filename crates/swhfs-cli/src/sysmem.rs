//! Total system RAM, used to resolve a percentage-based `direntry.maxram`
//! budget (§6). No crate in the teacher's workspace reads this for us, so
//! it's a direct `/proc/meminfo` read — Linux-only, matching `fuser`
//! itself (FUSE is a Linux/BSD kernel feature; the teacher's own
//! `tinymist-world` similarly reaches for a direct syscall rather than a
//! crate when the platform is already pinned).

/// Best-effort total system memory in bytes. Falls back to 1 GiB if
/// `/proc/meminfo` can't be read or parsed, so a percentage budget still
/// resolves to something sane on an unsupported platform.
pub fn total_ram_bytes() -> usize {
    const FALLBACK: usize = 1 << 30;
    let Ok(contents) = std::fs::read_to_string("/proc/meminfo") else {
        return FALLBACK;
    };
    parse_mem_total(&contents).unwrap_or(FALLBACK)
}

fn parse_mem_total(contents: &str) -> Option<usize> {
    let line = contents.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kib: usize = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_proc_meminfo_format() {
        let sample = "MemTotal:       16384000 kB\nMemFree:         512000 kB\n";
        assert_eq!(parse_mem_total(sample), Some(16384000 * 1024));
    }

    #[test]
    fn missing_field_is_none() {
        assert_eq!(parse_mem_total("Nonsense: 1\n"), None);
    }
}

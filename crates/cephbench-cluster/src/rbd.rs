//! RBD volume info parsing.
//!
//! `rbd info` is queried once at startup to learn the benchmark volume's
//! size, which is then substituted into the workload template. The size line
//! looks like `size 100 GiB in 25600 objects` (older releases print `GB`).

use cephbench_common::{BenchError, BenchResult};

fn unit_multiplier(unit: &str) -> Option<u64> {
    match unit {
        "KB" | "KiB" => Some(1 << 10),
        "MB" | "MiB" => Some(1 << 20),
        "GB" | "GiB" => Some(1 << 30),
        "TB" | "TiB" => Some(1 << 40),
        _ => None,
    }
}

/// Extract the volume size in bytes from `rbd info` output.
pub fn parse_volume_size(info: &str) -> BenchResult<u64> {
    for line in info.lines() {
        let line = line.trim();
        if !line.starts_with("size") {
            continue;
        }
        let mut fields = line.split_whitespace().skip(1);
        let value = fields
            .next()
            .ok_or_else(|| BenchError::parse("rbd info", "size line has no value"))?;
        let unit = fields
            .next()
            .ok_or_else(|| BenchError::parse("rbd info", "size line has no unit"))?;

        let value: f64 = value
            .parse()
            .map_err(|_| BenchError::parse("rbd info", format!("bad size value '{value}'")))?;
        let multiplier = unit_multiplier(unit)
            .ok_or_else(|| BenchError::parse("rbd info", format!("unknown size unit '{unit}'")))?;
        return Ok((value * multiplier as f64) as u64);
    }
    Err(BenchError::parse("rbd info", "no size line found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modern_size_line() {
        let info = "rbd image 'bench':\n\tsize 100 GiB in 25600 objects\n\torder 22 (4 MiB objects)\n";
        assert_eq!(parse_volume_size(info).unwrap(), 100 << 30);
    }

    #[test]
    fn test_legacy_units() {
        assert_eq!(parse_volume_size("size 512 MB in 128 objects").unwrap(), 512 << 20);
        assert_eq!(parse_volume_size("size 2 TB").unwrap(), 2 << 40);
    }

    #[test]
    fn test_fractional_size() {
        assert_eq!(parse_volume_size("size 1.5 GiB").unwrap(), (1.5 * (1u64 << 30) as f64) as u64);
    }

    #[test]
    fn test_missing_size_line() {
        let err = parse_volume_size("rbd image 'bench':\n\torder 22\n").unwrap_err();
        assert!(matches!(err, BenchError::Parse { .. }));
    }

    #[test]
    fn test_unknown_unit() {
        let err = parse_volume_size("size 3 parsecs").unwrap_err();
        assert!(err.to_string().contains("parsecs"));
    }
}

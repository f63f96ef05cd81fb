//! End-of-run summary table.

use squeeze_core::RunSummary;

/// Print a formatted summary table to stderr.
pub fn print_summary(summary: &RunSummary) {
    let secs = summary.elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        summary.records as f64 / secs
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Records:      {:>8}", summary.records);
    eprintln!("    Downloaded:   {:>8}", summary.fetched);
    if summary.cache_hits > 0 {
        eprintln!("    From cache:   {:>8}", summary.cache_hits);
    }
    eprintln!("    Optimized:    {:>8}", summary.optimized);
    if summary.no_gain > 0 {
        eprintln!("    No gain:      {:>8}", summary.no_gain);
    }
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!(
        "    Original:     {:>10}",
        format_bytes(summary.total_original_bytes)
    );
    eprintln!(
        "    Optimized:    {:>10}",
        format_bytes(summary.total_optimized_bytes)
    );
    eprintln!(
        "    Saved:        {:>10} ({:.1}%)",
        format_bytes(summary.saved_bytes()),
        summary.saved_fraction() * 100.0
    );
    eprintln!("    Duration:     {:>7.1}s", secs);
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("  ====================================");
}

/// Human-readable byte count (decimal units).
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(999), "999 B");
        assert_eq!(format_bytes(1_000), "1.0 KB");
        assert_eq!(format_bytes(1_500_000), "1.5 MB");
        assert_eq!(format_bytes(2_000_000_000), "2.0 GB");
    }
}

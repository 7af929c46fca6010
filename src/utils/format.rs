/// Human readable transfer rate in binary units
pub fn format_speed(bytes_per_second: i64) -> String {
    if bytes_per_second <= 0 {
        return "0 B/s".to_string();
    }

    const UNITS: [&str; 4] = ["B/s", "KiB/s", "MiB/s", "GiB/s"];
    let mut speed = bytes_per_second as f64;
    let mut unit = 0;
    while speed >= 1024.0 && unit < UNITS.len() - 1 {
        speed /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", speed, UNITS[unit])
}

/// Remaining time; negative values mean the daemon has no estimate
pub fn format_eta(seconds: i64) -> String {
    if seconds < 0 {
        return "infinite".to_string();
    }

    let (minutes, secs) = (seconds / 60, seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 48 {
        return format!("{}d {}h", hours / 24, hours % 24);
    }
    if hours > 0 {
        return format!("{}h {}m", hours, minutes);
    }
    if minutes > 0 {
        return format!("{}m {}s", minutes, secs);
    }
    format!("{}s", secs)
}

/// Progress fraction as a percentage with one decimal
pub fn format_progress(progress: f64) -> String {
    format!("{:.1}%", progress * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(0), "0 B/s");
        assert_eq!(format_speed(-5), "0 B/s");
        assert_eq!(format_speed(512), "512.0 B/s");
        assert_eq!(format_speed(1536), "1.5 KiB/s");
        assert_eq!(format_speed(5 * 1024 * 1024), "5.0 MiB/s");
        // Stops at the largest unit
        assert_eq!(format_speed(2048 * 1024 * 1024 * 1024), "2048.0 GiB/s");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(-1), "infinite");
        assert_eq!(format_eta(0), "0s");
        assert_eq!(format_eta(59), "59s");
        assert_eq!(format_eta(61), "1m 1s");
        assert_eq!(format_eta(3 * 3600 + 120), "3h 2m");
        // 48 hours is still shown in hours
        assert_eq!(format_eta(48 * 3600), "48h 0m");
        assert_eq!(format_eta(49 * 3600), "2d 1h");
    }

    #[test]
    fn test_format_progress() {
        assert_eq!(format_progress(0.0), "0.0%");
        assert_eq!(format_progress(0.5), "50.0%");
        assert_eq!(format_progress(1.0), "100.0%");
    }
}

/// Bytes in one gigabyte as reported in the performance header (1024³).
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Format an integer counter with thousands separators.
///
/// # Examples
///
/// ```
/// use flows_core::formatting::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1_048_576), "1,048,576");
/// ```
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Ratio of two counters as a `"NN.NN%"` string, `"0.00%"` when `whole` is zero.
///
/// # Examples
///
/// ```
/// use flows_core::formatting::format_percent;
///
/// assert_eq!(format_percent(1, 4), "25.00%");
/// assert_eq!(format_percent(0, 0), "0.00%");
/// ```
pub fn format_percent(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "0.00%".to_string();
    }
    format!("{:.2}%", (part as f64 / whole as f64) * 100.0)
}

/// Size in gigabytes, two decimals, `"GB"` suffix.
pub fn format_gigabytes(bytes: u64) -> String {
    format!("{:.2}GB", bytes as f64 / BYTES_PER_GB)
}

/// `amount / seconds`, or `0.0` when no time elapsed.
pub fn per_second(amount: f64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        amount / seconds
    } else {
        0.0
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

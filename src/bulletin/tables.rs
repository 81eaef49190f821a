// Lookup tables from feed codes to display strings. Total functions: an
// unknown input never fails.

/// Marker rendered for unknown scale codes, depths, magnitudes and locations.
pub const UNKNOWN: &str = "不明";

/// Every intensity code the feeds define, weakest first.
pub const SCALE_CODES: [i32; 9] = [10, 20, 30, 40, 45, 50, 55, 60, 70];

pub fn scale_label(code: i32) -> &'static str {
    match code {
        10 => "1",
        20 => "2",
        30 => "3",
        40 => "4",
        45 => "5弱",
        50 => "5強",
        55 => "6弱",
        60 => "6強",
        70 => "7",
        _ => UNKNOWN,
    }
}

// Unrecognized tokens pass through verbatim.
pub fn tsunami_sentence(token: &str) -> &str {
    match token {
        "None" => "この地震による津波の心配はありません",
        "Unknown" => "この地震による津波の有無は不明です",
        "Checking" => "この地震による津波影響は現在調査中です",
        "NonEffective" => "この地震により若干の海面変動が予想されますが、被害の心配はありません",
        "Watch" => "この地震により津波注意報等を発表しています",
        "Warning" => "この地震により津波警報等を発表しています",
        other => other,
    }
}

/// Depth 0 is the feeds' sentinel for "very shallow", negative means undetermined.
pub fn depth_label(km: i32) -> String {
    match km {
        0 => "ごく浅い".to_string(),
        d if d < 0 => UNKNOWN.to_string(),
        d => format!("{}km", d),
    }
}

pub fn magnitude_label(magnitude: f64) -> String {
    if magnitude < 0.0 || !magnitude.is_finite() {
        UNKNOWN.to_string()
    } else {
        format!("M{:.1}", magnitude)
    }
}

pub fn location_label(name: &str) -> &str {
    if name.is_empty() {
        UNKNOWN
    } else {
        name
    }
}

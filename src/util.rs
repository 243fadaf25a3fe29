use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub fn format_age(days: f32) -> String {
    let days = days.max(0.0);
    if days < 1.0 {
        "today".to_string()
    } else if days < 14.0 {
        format!("{}d ago", days as u32)
    } else if days < 60.0 {
        format!("{}w ago", (days / 7.0) as u32)
    } else {
        format!("{}mo ago", (days / 30.0) as u32)
    }
}

pub fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut = text
            .chars()
            .take(max_chars.saturating_sub(1))
            .collect::<String>();
        format!("{cut}…")
    }
}

pub fn stable_pair(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_label_buckets() {
        assert_eq!(format_age(0.0), "today");
        assert_eq!(format_age(3.0), "3d ago");
        assert_eq!(format_age(21.0), "3w ago");
        assert_eq!(format_age(95.0), "3mo ago");
        assert_eq!(format_age(-4.0), "today");
    }

    #[test]
    fn truncation_keeps_short_labels() {
        assert_eq!(truncate_label("BTC swing", 24), "BTC swing");
        let long = "a very long idea title that keeps going";
        let cut = truncate_label(long, 10);
        assert!(cut.chars().count() <= 10);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn stable_pair_is_deterministic_and_bounded() {
        let (x1, y1) = stable_pair("idea-42");
        let (x2, y2) = stable_pair("idea-42");
        assert_eq!((x1, y1), (x2, y2));
        assert!((-1.0..=1.0).contains(&x1));
        assert!((-1.0..=1.0).contains(&y1));
    }
}

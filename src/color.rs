use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use eframe::egui::Color32;

use crate::extract::is_crypto_symbol;
use crate::graph::LinkKind;

pub const ACCENT_GOLD: Color32 = Color32::from_rgb(246, 206, 104);
pub const CRYPTO_AMBER: Color32 = Color32::from_rgb(242, 153, 74);
pub const EQUITY_TEAL: Color32 = Color32::from_rgb(86, 176, 192);

const TOPIC_PALETTE: [Color32; 8] = [
    Color32::from_rgb(102, 153, 255),
    Color32::from_rgb(96, 200, 140),
    Color32::from_rgb(235, 130, 120),
    Color32::from_rgb(196, 140, 232),
    Color32::from_rgb(232, 196, 100),
    Color32::from_rgb(110, 196, 212),
    Color32::from_rgb(226, 134, 190),
    Color32::from_rgb(150, 170, 110),
];

const TAG_RING_PALETTE: [Color32; 4] = [
    Color32::from_rgb(178, 140, 245),
    Color32::from_rgb(120, 160, 245),
    Color32::from_rgb(96, 200, 220),
    Color32::from_rgb(110, 212, 160),
];

pub fn topic_color(topic: &str) -> Color32 {
    let mut hasher = DefaultHasher::new();
    topic.hash(&mut hasher);
    TOPIC_PALETTE[(hasher.finish() % TOPIC_PALETTE.len() as u64) as usize]
}

/// Timeline ramp: warm for fresh ideas, fading toward a cool slate as the
/// idea ages out over ~45 days.
pub fn age_color(age: f32) -> Color32 {
    let t = (age / 45.0).clamp(0.0, 1.0);
    let lerp = |a: f32, b: f32| (a + (b - a) * t) as u8;
    Color32::from_rgb(lerp(255.0, 96.0), lerp(168.0, 116.0), lerp(92.0, 164.0))
}

pub fn asset_class_color(tickers: &[String]) -> Color32 {
    if tickers.iter().any(|ticker| is_crypto_symbol(ticker)) {
        CRYPTO_AMBER
    } else {
        EQUITY_TEAL
    }
}

pub fn tag_ring_color(level: usize) -> Color32 {
    TAG_RING_PALETTE[level % TAG_RING_PALETTE.len()]
}

pub fn link_color(kind: LinkKind) -> Color32 {
    match kind {
        LinkKind::Topic => Color32::from_rgb(120, 150, 200),
        LinkKind::Tag => Color32::from_rgb(140, 120, 190),
        LinkKind::Temporal => Color32::from_rgb(110, 180, 150),
        LinkKind::Hierarchy => Color32::from_rgb(170, 140, 230),
        LinkKind::Ticker => Color32::from_rgb(214, 178, 96),
        LinkKind::Strategy => Color32::from_rgb(190, 130, 160),
    }
}

/// Temporal links fade with the age of their newer endpoint.
pub fn temporal_fade(age: f32) -> f32 {
    (1.0 - age / 60.0).clamp(0.25, 1.0)
}

pub fn blend(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub fn dim(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_colors_are_stable() {
        assert_eq!(topic_color("Breakout"), topic_color("Breakout"));
    }

    #[test]
    fn age_ramp_clamps_at_both_ends() {
        assert_eq!(age_color(-5.0), age_color(0.0));
        assert_eq!(age_color(45.0), age_color(500.0));
        assert_ne!(age_color(0.0), age_color(45.0));
    }

    #[test]
    fn asset_class_splits_crypto_from_equity() {
        assert_eq!(asset_class_color(&["ETH".to_string()]), CRYPTO_AMBER);
        assert_eq!(asset_class_color(&["NVDA".to_string()]), EQUITY_TEAL);
        assert_eq!(
            asset_class_color(&["NVDA".to_string(), "BTC".to_string()]),
            CRYPTO_AMBER
        );
    }

    #[test]
    fn temporal_fade_is_bounded() {
        assert_eq!(temporal_fade(0.0), 1.0);
        assert_eq!(temporal_fade(500.0), 0.25);
    }

    #[test]
    fn dim_reduces_channels() {
        let dimmed = dim(Color32::from_rgb(200, 100, 50), 0.5);
        assert_eq!(dimmed.r(), 100);
        assert_eq!(dimmed.g(), 50);
        assert_eq!(dimmed.b(), 25);
    }
}

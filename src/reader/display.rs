// Presentation helpers for the reader chrome
use serde::Serialize;

use crate::settings::settings::TypographySettings;

const FONT_STEP_REM: f32 = 0.1;
const MIN_FONT_REM: f32 = 1.0;
const MAX_FONT_REM: f32 = 2.0;

/// `m:ss`, floored to whole seconds
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Upper bound of the seek control
pub fn scrubber_max(duration: f64, fallback: f64) -> f64 {
    if duration > 0.0 {
        duration
    } else {
        fallback
    }
}

/// Font family class for an article category
pub fn font_class(category: &str) -> &'static str {
    match category {
        "TECH" => "font-mono",
        "CULTURE" => "font-display",
        _ => "font-serif",
    }
}

/// Focus mode text sizing
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Typography {
    pub font_size_rem: f32,
    pub line_height: f32,
}

impl Typography {
    pub fn from_settings(settings: &TypographySettings) -> Self {
        Self {
            font_size_rem: settings.font_size_rem.clamp(MIN_FONT_REM, MAX_FONT_REM),
            line_height: settings.line_height,
        }
    }

    pub fn larger(self) -> Self {
        Self {
            font_size_rem: (self.font_size_rem + FONT_STEP_REM).min(MAX_FONT_REM),
            ..self
        }
    }

    pub fn smaller(self) -> Self {
        Self {
            font_size_rem: (self.font_size_rem - FONT_STEP_REM).max(MIN_FONT_REM),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(9.99), "0:09");
        assert_eq!(format_time(75.4), "1:15");
        assert_eq!(format_time(3600.0), "60:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }

    #[test]
    fn test_scrubber_max_falls_back_before_load() {
        assert_eq!(scrubber_max(0.0, 100.0), 100.0);
        assert_eq!(scrubber_max(42.5, 100.0), 42.5);
    }

    #[test]
    fn test_font_class() {
        assert_eq!(font_class("POLITICS"), "font-serif");
        assert_eq!(font_class("TECH"), "font-mono");
        assert_eq!(font_class("CULTURE"), "font-display");
        assert_eq!(font_class("SPORT"), "font-serif");
    }

    #[test]
    fn test_font_size_steps_are_clamped() {
        let mut t = Typography::from_settings(&TypographySettings::default());
        for _ in 0..20 {
            t = t.larger();
        }
        assert_eq!(t.font_size_rem, MAX_FONT_REM);
        for _ in 0..20 {
            t = t.smaller();
        }
        assert_eq!(t.font_size_rem, MIN_FONT_REM);
        assert_eq!(t.line_height, 1.75);
    }
}

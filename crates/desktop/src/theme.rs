use iced::theme::Palette;
use iced::{color, Color, Theme};

use noseline_core::tracking::domain::tracking_result::Verdict;

use crate::settings::Appearance;

pub fn resolve_theme(appearance: Appearance, high_contrast: bool) -> Theme {
    let is_dark = match appearance {
        Appearance::Dark => true,
        Appearance::Light => false,
        Appearance::System => detect_system_dark_mode(),
    };

    let mut palette = if is_dark { dark_palette() } else { light_palette() };
    if high_contrast {
        palette.background = if is_dark { Color::BLACK } else { Color::WHITE };
        palette.text = if is_dark { Color::WHITE } else { Color::BLACK };
    }

    Theme::custom("Noseline", palette)
}

/// Status line color for a verdict.
pub fn verdict_color(theme: &Theme, verdict: Verdict) -> Color {
    let palette = theme.palette();
    match verdict {
        Verdict::Attentive => palette.success,
        Verdict::Inattentive => palette.danger,
        Verdict::Unknown => palette.warning,
    }
}

fn dark_palette() -> Palette {
    Palette {
        background: color!(0x1e, 0x1e, 0x22),
        text: color!(0xe6, 0xe6, 0xe6),
        primary: color!(0x00, 0xaa, 0xff),
        success: color!(0x3b, 0xdc, 0x6b),
        warning: color!(0xff, 0xd4, 0x00),
        danger: color!(0xff, 0x3b, 0x3b),
    }
}

fn light_palette() -> Palette {
    Palette {
        background: color!(0xf4, 0xf4, 0xf6),
        text: color!(0x1a, 0x1a, 0x1c),
        primary: color!(0x00, 0x78, 0xd4),
        success: color!(0x1f, 0x9d, 0x48),
        warning: color!(0xb2, 0x7a, 0x00),
        danger: color!(0xd7, 0x1f, 0x1f),
    }
}

fn detect_system_dark_mode() -> bool {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("defaults")
            .args(["read", "-g", "AppleInterfaceStyle"])
            .output()
            .map(|o| {
                String::from_utf8_lossy(&o.stdout)
                    .trim()
                    .eq_ignore_ascii_case("dark")
            })
            .unwrap_or(true)
    }
    #[cfg(not(target_os = "macos"))]
    {
        true
    }
}

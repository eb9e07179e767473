// Chrome colors for the panels around the stage. Blob, glyph and emotion
// colors come from the emotion palette and never from the theme.

use ratatui::style::Color;

pub const THEME_DARK: &str = "dark";
pub const THEME_LIGHT: &str = "light";

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    /// Titles, the active transcript row and the segment counter.
    pub primary: Color,
    /// Speaker labels.
    pub secondary: Color,
    pub text: Color,
    pub text_dim: Color,
    /// Toggle states that are switched on.
    pub accent: Color,
    pub border: Color,
    /// Failed segments and the error bar.
    pub error: Color,
    /// Loading segments.
    pub warning: Color,
    /// Playing segments.
    pub success: Color,
    /// Level meters of blobs that are not speaking.
    pub meter_idle: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            primary: Color::Cyan,
            secondary: Color::Magenta,
            text: Color::White,
            text_dim: Color::DarkGray,
            accent: Color::Yellow,
            border: Color::DarkGray,
            error: Color::Red,
            warning: Color::Yellow,
            success: Color::Green,
            meter_idle: Color::Rgb(70, 70, 80),
        }
    }

    pub fn light() -> Self {
        Self {
            primary: Color::Blue,
            secondary: Color::Rgb(150, 40, 140),
            text: Color::Black,
            text_dim: Color::Gray,
            accent: Color::Rgb(180, 120, 0),
            border: Color::Rgb(180, 180, 180),
            error: Color::Red,
            warning: Color::Rgb(180, 120, 0),
            success: Color::Rgb(0, 140, 60),
            meter_idle: Color::Rgb(190, 190, 200),
        }
    }

    /// Theme by config name, case-insensitive; anything unknown is dark.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case(THEME_LIGHT) {
            Self::light()
        } else {
            Self::dark()
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_name_falls_back_to_dark() {
        assert_eq!(Theme::from_name("solarized"), Theme::dark());
        assert_eq!(Theme::from_name(" Light "), Theme::light());
    }
}

//! Palette and color mode conversion for terminals.

use crossterm::style::Color as CrosstermColor;

/// A cell color: either the terminal default or an RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    /// Use whatever the terminal's default foreground/background is.
    #[default]
    Default,
    /// 24-bit color, downsampled by [`ColorMode`] when needed.
    Rgb(u8, u8, u8),
}

impl Color {
    pub const WHITE: Self = Self::Rgb(230, 230, 230);
    pub const BLACK: Self = Self::Rgb(0, 0, 0);
    pub const GRAY: Self = Self::Rgb(128, 128, 128);
    pub const RED: Self = Self::Rgb(230, 60, 60);
    pub const YELLOW: Self = Self::Rgb(230, 200, 50);
    pub const GREEN: Self = Self::Rgb(80, 200, 100);
    pub const CYAN: Self = Self::Rgb(60, 190, 210);
    pub const BLUE: Self = Self::Rgb(70, 110, 220);
}

/// Terminal color capability mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// 24-bit true color (COLORTERM=truecolor or 24bit).
    #[default]
    TrueColor,
    /// 256 color palette.
    Color256,
    /// 16 ANSI colors.
    Color16,
    /// Monochrome (no color). Styling falls back to text attributes.
    Mono,
}

impl ColorMode {
    /// Auto-detect terminal color capabilities.
    ///
    /// `NO_COLOR` (any value) forces [`ColorMode::Mono`].
    #[must_use]
    pub fn detect() -> Self {
        if std::env::var_os("NO_COLOR").is_some() {
            return Self::Mono;
        }
        Self::detect_with_env(std::env::var("COLORTERM").ok(), std::env::var("TERM").ok())
    }

    /// Detect color mode from environment variable values.
    #[must_use]
    pub fn detect_with_env(colorterm: Option<String>, term: Option<String>) -> Self {
        if matches!(colorterm.as_deref(), Some("truecolor" | "24bit")) {
            return Self::TrueColor;
        }

        match term.as_deref() {
            Some(t) if t.contains("256color") => Self::Color256,
            Some(t) if t.contains("color") || t.contains("xterm") => Self::Color16,
            Some("dumb") | None => Self::Mono,
            _ => Self::Color16,
        }
    }

    /// Whether this mode renders any color at all.
    #[must_use]
    pub const fn has_color(self) -> bool {
        !matches!(self, Self::Mono)
    }

    /// Convert a cell color to a crossterm color for this mode.
    #[must_use]
    pub fn to_crossterm(self, color: Color) -> CrosstermColor {
        let Color::Rgb(r, g, b) = color else {
            return CrosstermColor::Reset;
        };

        match self {
            Self::TrueColor => CrosstermColor::Rgb { r, g, b },
            Self::Color256 => CrosstermColor::AnsiValue(Self::rgb_to_256(r, g, b)),
            Self::Color16 => Self::rgb_to_16(r, g, b),
            Self::Mono => CrosstermColor::Reset,
        }
    }

    /// Convert RGB to 256-color palette index.
    fn rgb_to_256(r: u8, g: u8, b: u8) -> u8 {
        if r == g && g == b {
            if r < 8 {
                return 16;
            }
            if r > 248 {
                return 231;
            }
            // Grayscale ramp: 232-255
            return 232 + ((r - 8) / 10).min(23);
        }

        // 6x6x6 color cube (16-231)
        let r_idx = (u16::from(r) * 5 / 255) as u8;
        let g_idx = (u16::from(g) * 5 / 255) as u8;
        let b_idx = (u16::from(b) * 5 / 255) as u8;
        16 + 36 * r_idx + 6 * g_idx + b_idx
    }

    /// Convert RGB to 16-color ANSI.
    fn rgb_to_16(r: u8, g: u8, b: u8) -> CrosstermColor {
        let luminance = (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000;
        let bright = luminance > 127;

        let threshold = r.max(g).max(b) / 2;
        let has_r = r > threshold;
        let has_g = g > threshold;
        let has_b = b > threshold;

        match (has_r, has_g, has_b, bright) {
            (false, false, false, false) => CrosstermColor::Black,
            (false, false, false, true) => CrosstermColor::DarkGrey,
            (true, false, false, false) => CrosstermColor::DarkRed,
            (true, false, false, true) => CrosstermColor::Red,
            (false, true, false, false) => CrosstermColor::DarkGreen,
            (false, true, false, true) => CrosstermColor::Green,
            (true, true, false, false) => CrosstermColor::DarkYellow,
            (true, true, false, true) => CrosstermColor::Yellow,
            (false, false, true, false) => CrosstermColor::DarkBlue,
            (false, false, true, true) => CrosstermColor::Blue,
            (true, false, true, false) => CrosstermColor::DarkMagenta,
            (true, false, true, true) => CrosstermColor::Magenta,
            (false, true, true, false) => CrosstermColor::DarkCyan,
            (false, true, true, true) => CrosstermColor::Cyan,
            (true, true, true, false) => CrosstermColor::Grey,
            (true, true, true, true) => CrosstermColor::White,
        }
    }
}

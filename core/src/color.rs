use std::fmt;

pub const FALLBACK_COLOR: Color = Color(0xFF_FFFF);

/// 24-bit RGB colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    /// Accepts `#rrggbb`, `0xrrggbb`, bare hex digits, or a decimal number (a host colour
    /// stored as an integer). Unprefixed all-digit input is read as decimal. Zero (unset) and
    /// unparsable input yield `None`.
    pub fn parse(raw: &str) -> Option<Color> {
        let trimmed = raw.trim().to_ascii_lowercase();
        if trimmed.is_empty() {
            return None;
        }
        if let Some(digits) = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
        {
            return Color::from_u32(u32::from_str_radix(digits, 16).ok()?);
        }
        let value = if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            trimmed.parse::<u32>().ok()?
        } else {
            u32::from_str_radix(&trimmed, 16).ok()?
        };
        Color::from_u32(value)
    }

    pub fn from_u32(value: u32) -> Option<Color> {
        if value == 0 || value > 0xFF_FFFF {
            return None;
        }
        Some(Color(value))
    }

    pub fn resolve(raw: Option<&str>) -> Color {
        raw.and_then(Color::parse).unwrap_or(FALLBACK_COLOR)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_host_spellings() {
        assert_eq!(Color::parse("#FF8800"), Some(Color(0xFF8800)));
        assert_eq!(Color::parse("0x00ff00"), Some(Color(0x00FF00)));
        assert_eq!(Color::parse(" 3366cc "), Some(Color(0x3366CC)));
    }

    #[test]
    fn unprefixed_digits_are_decimal() {
        assert_eq!(Color::parse("3355443"), Some(Color(0x333333)));
        assert_eq!(Color::parse("#333333"), Some(Color(0x333333)));
        assert_eq!(Color::parse("16777216"), None);
    }

    #[test]
    fn falls_back_to_white() {
        assert_eq!(Color::resolve(None), FALLBACK_COLOR);
        assert_eq!(Color::resolve(Some("not a colour")), FALLBACK_COLOR);
        assert_eq!(Color::resolve(Some("#000000")), FALLBACK_COLOR);
        assert_eq!(Color(0xABCDEF).to_string(), "#abcdef");
    }
}

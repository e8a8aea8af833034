//! Standard 14 fonts, font-name mapping and WinAnsi text encoding.

use serde::{Deserialize, Serialize};

/// The 14 fonts every PDF viewer must provide without embedding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
    Symbol,
    ZapfDingbats,
}

impl StandardFont {
    pub const ALL: [StandardFont; 14] = [
        StandardFont::Helvetica,
        StandardFont::HelveticaBold,
        StandardFont::HelveticaOblique,
        StandardFont::HelveticaBoldOblique,
        StandardFont::TimesRoman,
        StandardFont::TimesBold,
        StandardFont::TimesItalic,
        StandardFont::TimesBoldItalic,
        StandardFont::Courier,
        StandardFont::CourierBold,
        StandardFont::CourierOblique,
        StandardFont::CourierBoldOblique,
        StandardFont::Symbol,
        StandardFont::ZapfDingbats,
    ];

    /// PostScript name written as `/BaseFont`.
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
            StandardFont::Symbol => "Symbol",
            StandardFont::ZapfDingbats => "ZapfDingbats",
        }
    }

    pub fn from_base_font(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.base_font() == name)
    }

    /// Symbol and ZapfDingbats carry their own built-in encodings.
    pub fn uses_win_ansi(self) -> bool {
        !matches!(self, StandardFont::Symbol | StandardFont::ZapfDingbats)
    }

    fn with_style(self, bold: bool, italic: bool) -> Self {
        use StandardFont::*;
        match self {
            TimesRoman => match (bold, italic) {
                (true, true) => TimesBoldItalic,
                (true, false) => TimesBold,
                (false, true) => TimesItalic,
                (false, false) => TimesRoman,
            },
            Helvetica => match (bold, italic) {
                (true, true) => HelveticaBoldOblique,
                (true, false) => HelveticaBold,
                (false, true) => HelveticaOblique,
                (false, false) => Helvetica,
            },
            Courier => match (bold, italic) {
                (true, true) => CourierBoldOblique,
                (true, false) => CourierBold,
                (false, true) => CourierOblique,
                (false, false) => Courier,
            },
            other => other,
        }
    }
}

impl Default for StandardFont {
    fn default() -> Self {
        StandardFont::Helvetica
    }
}

/// Caller-facing text styling, resolved to a [`StandardFont`] on embed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    /// Font family or PostScript name; mapped to the Standard 14 set.
    #[serde(default)]
    pub font_name: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// `#RRGGBB`
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_bold: bool,
    #[serde(default)]
    pub is_italic: bool,
}

fn default_font_size() -> f32 {
    12.0
}

fn default_color() -> String {
    "#000000".to_string()
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_name: None,
            font_size: default_font_size(),
            color: default_color(),
            is_bold: false,
            is_italic: false,
        }
    }
}

impl TextStyle {
    /// Resolve the style to a Standard 14 font.
    ///
    /// A name that already carries style information ("Times-BoldItalic",
    /// "Arial Bold") wins over the `is_bold`/`is_italic` flags.
    pub fn standard_font(&self) -> StandardFont {
        self.standard_font_or(StandardFont::Helvetica)
    }

    pub fn standard_font_or(&self, fallback: StandardFont) -> StandardFont {
        let base = match &self.font_name {
            Some(name) => {
                let lower = name.to_lowercase();
                if lower.contains("italic") || lower.contains("bold") || lower.contains("oblique") {
                    return map_to_standard_font(name);
                }
                map_font_family_to_base(name)
            }
            None => fallback,
        };
        base.with_style(self.is_bold, self.is_italic)
    }
}

/// Map a font family name to a base font without style variants.
fn map_font_family_to_base(name: &str) -> StandardFont {
    let lower = name.to_lowercase();

    match lower.as_str() {
        "serif" => return StandardFont::TimesRoman,
        "sans-serif" | "cursive" | "fantasy" => return StandardFont::Helvetica,
        "monospace" => return StandardFont::Courier,
        _ => {}
    }

    if let Some(exact) = StandardFont::from_base_font(name) {
        return exact;
    }
    if lower.contains("times") || lower.contains("georgia") || lower.contains("garamond") {
        return StandardFont::TimesRoman;
    }
    if is_monospace(&lower) {
        return StandardFont::Courier;
    }
    if lower.contains("symbol") {
        return StandardFont::Symbol;
    }
    if lower.contains("zapf") || lower.contains("dingbat") {
        return StandardFont::ZapfDingbats;
    }
    StandardFont::Helvetica
}

/// Map a font name that may include style words to a Standard 14 font.
fn map_to_standard_font(name: &str) -> StandardFont {
    let lower = name.to_lowercase();
    let bold = lower.contains("bold");
    let italic = lower.contains("italic") || lower.contains("oblique");

    let family = if lower.contains("times") || lower.contains("georgia") {
        StandardFont::TimesRoman
    } else if is_monospace(&lower) {
        StandardFont::Courier
    } else if lower.contains("symbol") {
        return StandardFont::Symbol;
    } else if lower.contains("zapf") || lower.contains("dingbat") {
        return StandardFont::ZapfDingbats;
    } else {
        StandardFont::Helvetica
    };
    family.with_style(bold, italic)
}

fn is_monospace(lower: &str) -> bool {
    lower.contains("courier")
        || lower.contains("mono")
        || lower.contains("consolas")
        || lower.contains("monaco")
}

/// Code points 0x80..=0x9F of WinAnsiEncoding; `None` marks unused slots.
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// WinAnsiEncoding code of `c`, if it has one.
pub fn win_ansi_code(c: char) -> Option<u8> {
    let code = c as u32;
    if code < 0x80 || (0xA0..=0xFF).contains(&code) {
        return Some(code as u8);
    }
    WIN_ANSI_HIGH
        .iter()
        .position(|slot| *slot == Some(c))
        .map(|i| 0x80 + i as u8)
}

/// First character of `text` with no WinAnsi code.
pub fn first_non_win_ansi(text: &str) -> Option<char> {
    text.chars().find(|&c| win_ansi_code(c).is_none())
}

/// Encode text for a WinAnsi font. Unrepresentable characters become `?`;
/// callers that must not lose text check [`first_non_win_ansi`] first.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| win_ansi_code(c).unwrap_or(b'?'))
        .collect()
}

pub fn decode_win_ansi(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => WIN_ANSI_HIGH[(b - 0x80) as usize].unwrap_or('?'),
            _ => b as char,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(name: Option<&str>, bold: bool, italic: bool) -> TextStyle {
        TextStyle {
            font_name: name.map(String::from),
            is_bold: bold,
            is_italic: italic,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_style_is_helvetica() {
        assert_eq!(TextStyle::default().standard_font(), StandardFont::Helvetica);
    }

    #[test]
    fn test_css_generic_families() {
        assert_eq!(style(Some("serif"), false, false).standard_font(), StandardFont::TimesRoman);
        assert_eq!(style(Some("monospace"), false, false).standard_font(), StandardFont::Courier);
        assert_eq!(
            style(Some("sans-serif"), true, false).standard_font(),
            StandardFont::HelveticaBold
        );
    }

    #[test]
    fn test_flags_select_variant() {
        assert_eq!(
            style(Some("Times New Roman"), true, true).standard_font(),
            StandardFont::TimesBoldItalic
        );
        assert_eq!(
            style(Some("Consolas"), false, true).standard_font(),
            StandardFont::CourierOblique
        );
        assert_eq!(style(None, true, false).standard_font(), StandardFont::HelveticaBold);
    }

    #[test]
    fn test_styled_name_wins_over_flags() {
        assert_eq!(
            style(Some("Arial-BoldMT"), false, false).standard_font(),
            StandardFont::HelveticaBold
        );
        assert_eq!(
            style(Some("Times-Italic"), true, false).standard_font(),
            StandardFont::TimesItalic
        );
    }

    #[test]
    fn test_symbol_fonts_ignore_style() {
        assert_eq!(style(Some("Symbol"), true, true).standard_font(), StandardFont::Symbol);
        assert_eq!(
            style(Some("ZapfDingbats"), false, false).standard_font(),
            StandardFont::ZapfDingbats
        );
        assert!(!StandardFont::ZapfDingbats.uses_win_ansi());
    }

    #[test]
    fn test_base_font_names_are_reversible() {
        for font in StandardFont::ALL {
            assert_eq!(StandardFont::from_base_font(font.base_font()), Some(font));
        }
    }

    #[test]
    fn test_win_ansi_roundtrip_for_representable_text() {
        let text = "Café – “quoted” €5 naïve";
        assert_eq!(decode_win_ansi(&encode_win_ansi(text)), text);
    }

    #[test]
    fn test_win_ansi_replaces_unrepresentable() {
        assert_eq!(encode_win_ansi("a\u{4E2D}b"), b"a?b".to_vec());
    }

    #[test]
    fn test_first_non_win_ansi() {
        assert_eq!(first_non_win_ansi("Café €5 “ok”"), None);
        assert_eq!(first_non_win_ansi("ok Привет"), Some('П'));
        assert_eq!(win_ansi_code('\u{2122}'), Some(0x99));
        assert_eq!(win_ansi_code('\u{4E2D}'), None);
    }
}

// ResTable_config, kept as raw bytes with a readable qualifier rendering

use super::chunk::{read_u16, read_u32};
use super::ParseError;

const DENSITY_OFFSET: usize = 14;
const LANGUAGE_OFFSET: usize = 8;
const COUNTRY_OFFSET: usize = 10;
const ORIENTATION_OFFSET: usize = 12;
const SDK_OFFSET: usize = 24;
const UI_MODE_OFFSET: usize = 29;
const SMALLEST_WIDTH_OFFSET: usize = 30;
const WIDTH_DP_OFFSET: usize = 32;
const HEIGHT_DP_OFFSET: usize = 34;

const UI_MODE_NIGHT_MASK: u8 = 0x30;
const UI_MODE_NIGHT_NO: u8 = 0x10;
const UI_MODE_NIGHT_YES: u8 = 0x20;

/// The configuration a value applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResConfig {
    raw: Vec<u8>,
}

impl ResConfig {
    /// Read a config whose `size` field sits at `offset`
    pub fn read(data: &[u8], offset: usize) -> Result<Self, ParseError> {
        let size = read_u32(data, offset, "config size")? as usize;
        if size < 4 || offset + size > data.len() {
            return Err(ParseError::Truncated {
                offset,
                context: "config",
            });
        }
        Ok(Self {
            raw: data[offset..offset + size].to_vec(),
        })
    }

    pub fn from_raw(raw: Vec<u8>) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn is_default(&self) -> bool {
        self.raw.iter().skip(4).all(|b| *b == 0)
    }

    fn byte(&self, offset: usize) -> u8 {
        self.raw.get(offset).copied().unwrap_or(0)
    }

    fn short(&self, offset: usize) -> u16 {
        read_u16(&self.raw, offset, "config field").unwrap_or(0)
    }

    pub fn density(&self) -> u16 {
        self.short(DENSITY_OFFSET)
    }

    pub fn sdk_version(&self) -> u16 {
        self.short(SDK_OFFSET)
    }

    /// Qualifier string as it would appear in a resource directory name
    pub fn qualifier(&self) -> String {
        let mut parts = Vec::new();

        if let Some(language) = unpack_locale(self.byte(LANGUAGE_OFFSET), self.byte(LANGUAGE_OFFSET + 1), b'a') {
            match unpack_locale(self.byte(COUNTRY_OFFSET), self.byte(COUNTRY_OFFSET + 1), b'0') {
                Some(country) => parts.push(format!("{}-r{}", language, country)),
                None => parts.push(language),
            }
        }

        let smallest_width = self.short(SMALLEST_WIDTH_OFFSET);
        if smallest_width != 0 {
            parts.push(format!("sw{}dp", smallest_width));
        }
        let width = self.short(WIDTH_DP_OFFSET);
        if width != 0 {
            parts.push(format!("w{}dp", width));
        }
        let height = self.short(HEIGHT_DP_OFFSET);
        if height != 0 {
            parts.push(format!("h{}dp", height));
        }

        match self.byte(ORIENTATION_OFFSET) {
            1 => parts.push("port".to_string()),
            2 => parts.push("land".to_string()),
            _ => {}
        }

        match self.byte(UI_MODE_OFFSET) & UI_MODE_NIGHT_MASK {
            UI_MODE_NIGHT_NO => parts.push("notnight".to_string()),
            UI_MODE_NIGHT_YES => parts.push("night".to_string()),
            _ => {}
        }

        if let Some(density) = density_name(self.density()) {
            parts.push(density);
        }

        let sdk = self.sdk_version();
        if sdk != 0 {
            parts.push(format!("v{}", sdk));
        }

        if parts.is_empty() {
            "default".to_string()
        } else {
            parts.join("-")
        }
    }
}

fn density_name(density: u16) -> Option<String> {
    let name = match density {
        0 => return None,
        120 => "ldpi",
        160 => "mdpi",
        213 => "tvdpi",
        240 => "hdpi",
        320 => "xhdpi",
        480 => "xxhdpi",
        640 => "xxxhdpi",
        0xFFFE => "anydpi",
        0xFFFF => "nodpi",
        other => return Some(format!("{}dpi", other)),
    };
    Some(name.to_string())
}

/// Two ASCII letters, or three letters packed into 15 bits when the high bit is set
fn unpack_locale(first: u8, second: u8, base: u8) -> Option<String> {
    if first == 0 && second == 0 {
        return None;
    }
    if first & 0x80 != 0 {
        let a = second & 0x1f;
        let b = ((second & 0xe0) >> 5) | ((first & 0x03) << 3);
        let c = (first & 0x7c) >> 2;
        let chars = [a, b, c].iter().map(|v| (base + v) as char).collect();
        return Some(chars);
    }
    Some([first as char, second as char].iter().collect())
}

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::StudioError;

/// Which studio a request goes through. Selects the prompt template and the
/// option fields that are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Product,
    Portrait,
    Cartoon,
    GiftHamper,
    /// Generic fallback for preset names that are not recognized.
    Enhance,
}

impl Preset {
    /// Presets a user can pick. `Enhance` is only reached by fallback.
    pub const SELECTABLE: [Preset; 4] = [Preset::Product, Preset::Portrait, Preset::Cartoon, Preset::GiftHamper];

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::Product => "product",
            Preset::Portrait => "portrait",
            Preset::Cartoon => "cartoon",
            Preset::GiftHamper => "gift_hamper",
            Preset::Enhance => "enhance",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Preset::Product => "Product Studio",
            Preset::Portrait => "Pro Photography",
            Preset::Cartoon => "Cartoon Art",
            Preset::GiftHamper => "Gift Hamper",
            Preset::Enhance => "Enhance",
        }
    }

    /// Lenient lookup: never fails, unknown names map to `Enhance`.
    pub fn parse(name: &str) -> Preset {
        match normalize(name).as_str() {
            "product" | "productstudio" | "productstudiophoto" => Preset::Product,
            "portrait" | "human" | "humanbasesprofessional" | "prophotography" => Preset::Portrait,
            "cartoon" | "cartoonart" | "cartoonphoto" => Preset::Cartoon,
            "gifthamper" | "hamper" | "seserahan" => Preset::GiftHamper,
            "enhance" => Preset::Enhance,
            _ => {
                tracing::warn!(preset = name, "unknown preset, falling back to enhance");
                Preset::Enhance
            }
        }
    }

    pub fn default_options(self) -> PresetOptions {
        match self {
            Preset::Product => PresetOptions::Product(ProductOptions::default()),
            Preset::Portrait => PresetOptions::Portrait(PortraitOptions::default()),
            Preset::Cartoon => PresetOptions::Cartoon(CartoonOptions::default()),
            Preset::GiftHamper => PresetOptions::GiftHamper(GiftHamperOptions::default()),
            Preset::Enhance => PresetOptions::Enhance,
        }
    }

    /// Option fields this preset reads, with defaults and the values offered
    /// for selection.
    pub fn option_fields(self) -> &'static [OptionField] {
        match self {
            Preset::Product => PRODUCT_FIELDS,
            Preset::Portrait => PORTRAIT_FIELDS,
            Preset::Cartoon => CARTOON_FIELDS,
            Preset::GiftHamper => GIFT_HAMPER_FIELDS,
            Preset::Enhance => &[],
        }
    }
}

impl From<&str> for Preset {
    fn from(name: &str) -> Self {
        Preset::parse(name)
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AspectRatio {
    #[default]
    Square,
    Portrait3x4,
    Landscape4x3,
    Tall9x16,
    Wide16x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Tall9x16,
        AspectRatio::Wide16x9,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Tall9x16 => "9:16",
            AspectRatio::Wide16x9 => "16:9",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        AspectRatio::ALL
            .into_iter()
            .find(|ar| ar.as_str() == s)
            .ok_or_else(|| StudioError::InvalidSettings(format!("unsupported aspect ratio {s:?}")))
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = StudioError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(ar: AspectRatio) -> Self {
        ar.as_str().to_string()
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OptionField {
    pub name: &'static str,
    pub label: &'static str,
    pub default: &'static str,
    pub choices: &'static [&'static str],
}

const PRODUCT_FIELDS: &[OptionField] = &[
    OptionField {
        name: "lighting",
        label: "Lighting",
        default: "Softbox",
        choices: &["Softbox", "Spotlight", "Natural Window", "Neon Cyberpunk", "Studio Flash"],
    },
    OptionField {
        name: "background",
        label: "Background",
        default: "Solid White",
        choices: &["Solid White", "Marble Surface", "Wooden Table", "Concrete Texture", "Gradient Blur"],
    },
    OptionField {
        name: "placement",
        label: "Placement",
        default: "Center",
        choices: &["Center", "Rule of Thirds", "Floating", "Minimalist Flatlay"],
    },
];

const PORTRAIT_FIELDS: &[OptionField] = &[
    OptionField {
        name: "shotType",
        label: "Shot Type",
        default: "Headshot",
        choices: &["Headshot", "Half Body", "Full Body", "Close-up"],
    },
    OptionField {
        name: "lightingStyle",
        label: "Lighting Style",
        default: "Rembrandt",
        choices: &["Rembrandt", "Butterfly", "Split Lighting", "Loop Lighting", "Soft Glamour"],
    },
    OptionField {
        name: "clothingStyle",
        label: "Clothing / Vibe",
        default: "Professional",
        choices: &["Professional Corporate", "Casual Chic", "High Fashion", "Cyberpunk", "Vintage 90s"],
    },
];

const CARTOON_FIELDS: &[OptionField] = &[
    OptionField {
        name: "artStyle",
        label: "Art Style",
        default: "3D Render",
        choices: &["3D Render", "Anime", "Comic Book", "Oil Painting", "Pixel Art", "Watercolor"],
    },
    OptionField {
        name: "colorPalette",
        label: "Color Palette",
        default: "Vibrant",
        choices: &["Vibrant", "Pastel", "Dark & Moody", "Monochrome", "Warm Tones"],
    },
];

const GIFT_HAMPER_FIELDS: &[OptionField] = &[
    OptionField {
        name: "theme",
        label: "Theme",
        default: "Elegant Gold",
        choices: &["Elegant Gold", "Rustic Natural", "Modern Minimalist", "Traditional", "Pastel Romance"],
    },
    OptionField {
        name: "decorationStyle",
        label: "Decoration Style",
        default: "Floral",
        choices: &["Floral", "Ribbon & Lace", "Acrylic Box", "Rattan Tray", "Dried Flowers"],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProductOptions {
    pub lighting: String,
    pub background: String,
    pub placement: String,
}

impl Default for ProductOptions {
    fn default() -> Self {
        Self {
            lighting: PRODUCT_FIELDS[0].default.into(),
            background: PRODUCT_FIELDS[1].default.into(),
            placement: PRODUCT_FIELDS[2].default.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortraitOptions {
    pub shot_type: String,
    pub lighting_style: String,
    pub clothing_style: String,
}

impl Default for PortraitOptions {
    fn default() -> Self {
        Self {
            shot_type: PORTRAIT_FIELDS[0].default.into(),
            lighting_style: PORTRAIT_FIELDS[1].default.into(),
            clothing_style: PORTRAIT_FIELDS[2].default.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CartoonOptions {
    pub art_style: String,
    pub color_palette: String,
}

impl Default for CartoonOptions {
    fn default() -> Self {
        Self {
            art_style: CARTOON_FIELDS[0].default.into(),
            color_palette: CARTOON_FIELDS[1].default.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GiftHamperOptions {
    pub theme: String,
    pub decoration_style: String,
}

impl Default for GiftHamperOptions {
    fn default() -> Self {
        Self {
            theme: GIFT_HAMPER_FIELDS[0].default.into(),
            decoration_style: GIFT_HAMPER_FIELDS[1].default.into(),
        }
    }
}

/// Preset-specific options. The variant is the preset; each carries only the
/// fields its template reads.
///
/// Serializes internally tagged (`preset: gift_hamper`). Deserializing goes
/// through [`Preset::parse`], so any spelling the CLI accepts also works in a
/// config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "preset", rename_all = "snake_case")]
pub enum PresetOptions {
    Product(ProductOptions),
    Portrait(PortraitOptions),
    Cartoon(CartoonOptions),
    GiftHamper(GiftHamperOptions),
    Enhance,
}

impl<'de> Deserialize<'de> for PresetOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let tag = match fields.remove("preset") {
            Some(serde_json::Value::String(tag)) => tag,
            Some(other) => return Err(de::Error::custom(format!("preset must be a string, got {other}"))),
            None => return Err(de::Error::missing_field("preset")),
        };

        let mut options = Preset::parse(&tag).default_options();
        for (name, value) in fields {
            let value = match value {
                serde_json::Value::String(v) => v,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            match options.field_mut(&name) {
                Some(slot) => *slot = value,
                None => tracing::debug!(field = %name, preset = %options.preset(), "ignoring option foreign to preset"),
            }
        }
        Ok(options)
    }
}

impl PresetOptions {
    pub fn preset(&self) -> Preset {
        match self {
            PresetOptions::Product(_) => Preset::Product,
            PresetOptions::Portrait(_) => Preset::Portrait,
            PresetOptions::Cartoon(_) => Preset::Cartoon,
            PresetOptions::GiftHamper(_) => Preset::GiftHamper,
            PresetOptions::Enhance => Preset::Enhance,
        }
    }

    /// Returns the slot for `name` if the active preset has such a field.
    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        let key = normalize(name);
        match self {
            PresetOptions::Product(o) => match key.as_str() {
                "lighting" => Some(&mut o.lighting),
                "background" => Some(&mut o.background),
                "placement" => Some(&mut o.placement),
                _ => None,
            },
            PresetOptions::Portrait(o) => match key.as_str() {
                "shottype" => Some(&mut o.shot_type),
                "lightingstyle" => Some(&mut o.lighting_style),
                "clothingstyle" => Some(&mut o.clothing_style),
                _ => None,
            },
            PresetOptions::Cartoon(o) => match key.as_str() {
                "artstyle" => Some(&mut o.art_style),
                "colorpalette" => Some(&mut o.color_palette),
                _ => None,
            },
            PresetOptions::GiftHamper(o) => match key.as_str() {
                "theme" | "seserahantheme" => Some(&mut o.theme),
                "decorationstyle" => Some(&mut o.decoration_style),
                _ => None,
            },
            PresetOptions::Enhance => None,
        }
    }
}

impl Default for PresetOptions {
    fn default() -> Self {
        Preset::Product.default_options()
    }
}

/// Everything the caller tunes between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioSettings {
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub additional_notes: String,
    #[serde(flatten)]
    pub options: PresetOptions,
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self::for_preset(Preset::Product)
    }
}

impl StudioSettings {
    pub fn for_preset(preset: Preset) -> Self {
        Self {
            aspect_ratio: AspectRatio::default(),
            additional_notes: String::new(),
            options: preset.default_options(),
        }
    }

    pub fn preset(&self) -> Preset {
        self.options.preset()
    }

    pub fn with_aspect_ratio(mut self, ar: AspectRatio) -> Self {
        self.aspect_ratio = ar;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.additional_notes = notes.into();
        self
    }

    /// Switch presets. Universal fields survive; preset options reset to the
    /// new preset's defaults.
    pub fn switch_preset(&mut self, preset: Preset) {
        if self.preset() != preset {
            self.options = preset.default_options();
        }
    }

    /// Set an option by field name (camelCase or snake_case).
    ///
    /// Returns `Ok(false)` when the active preset has no such field; the
    /// value is ignored in that case.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<bool, StudioError> {
        match normalize(name).as_str() {
            "aspectratio" => {
                self.aspect_ratio = value.parse()?;
                return Ok(true);
            }
            "additionalnotes" | "additionalprompt" | "notes" => {
                self.additional_notes = value.to_string();
                return Ok(true);
            }
            _ => {}
        }
        match self.options.field_mut(name) {
            Some(slot) => {
                *slot = value.to_string();
                Ok(true)
            }
            None => {
                tracing::debug!(field = name, preset = %self.preset(), "ignoring option foreign to preset");
                Ok(false)
            }
        }
    }
}

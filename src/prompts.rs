use crate::settings::{PresetOptions, StudioSettings};

/// Render the instruction text sent alongside the source image.
///
/// Pure and total: every settings value yields a prompt, and each template
/// only reads the fields of its own preset.
pub fn build_prompt(settings: &StudioSettings) -> String {
    let notes = &settings.additional_notes;
    let base = if notes.is_empty() { String::new() } else { format!("Additional context: {notes}. ") };

    let body = match &settings.options {
        PresetOptions::Product(o) => format!(
            "Transform this image into a professional product photography shot.\n\
             Lighting: {lighting}.\n\
             Background: {background}.\n\
             Placement: {placement}.\n\
             Ensure high resolution, sharp details, and commercial aesthetic. 8k, highly detailed.",
            lighting = o.lighting,
            background = o.background,
            placement = o.placement,
        ),
        PresetOptions::Portrait(o) => format!(
            "Transform this person into a professional studio portrait.\n\
             Shot type: {shot}.\n\
             Lighting style: {lighting}.\n\
             Clothing/Vibe: {clothing}.\n\
             Photorealistic, skin texture details, professional color grading, 8k.",
            shot = o.shot_type,
            lighting = o.lighting_style,
            clothing = o.clothing_style,
        ),
        PresetOptions::Cartoon(o) => format!(
            "Turn this image into a {style} style illustration.\n\
             Color palette: {palette}.\n\
             High quality, artistic, detailed, creative.",
            style = o.art_style,
            palette = o.color_palette,
        ),
        PresetOptions::GiftHamper(o) => format!(
            "Transform this image into a beautiful professional seserahan (wedding gift hamper) photography.\n\
             Theme: {theme}.\n\
             Decoration Style: {decoration}.\n\
             Ensure the gifts are elegantly arranged in a tray or box.\n\
             Soft, romantic lighting, elegant presentation, premium aesthetic, 8k resolution.",
            theme = o.theme,
            decoration = o.decoration_style,
        ),
        PresetOptions::Enhance => "Enhance this image professionally.".to_string(),
    };

    base + &body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Preset, ProductOptions};

    fn product(placement: &str) -> StudioSettings {
        StudioSettings {
            options: PresetOptions::Product(ProductOptions {
                lighting: "Softbox".into(),
                background: "Solid White".into(),
                placement: placement.into(),
            }),
            ..StudioSettings::default()
        }
    }

    #[test]
    fn same_settings_same_prompt() {
        for preset in Preset::SELECTABLE {
            let s = StudioSettings::for_preset(preset).with_notes("warm tones");
            assert_eq!(build_prompt(&s), build_prompt(&s.clone()));
        }
    }

    #[test]
    fn product_prompt_interpolates_its_fields() {
        let p = build_prompt(&product("Rule of Thirds"));
        assert!(p.starts_with("Transform this image into a professional product photography shot."));
        assert!(p.contains("Lighting: Softbox."));
        assert!(p.contains("Background: Solid White."));
        assert!(p.contains("Placement: Rule of Thirds."));
    }

    #[test]
    fn notes_clause_only_when_notes_present() {
        let plain = build_prompt(&product("Center"));
        assert!(!plain.contains("Additional context"));

        let blank = build_prompt(&product("Center").with_notes("  "));
        assert!(blank.starts_with("Additional context:   . Transform this image"));

        let padded = build_prompt(&product("Center").with_notes(" warm "));
        assert!(padded.starts_with("Additional context:  warm . "));

        let noted = build_prompt(&product("Center").with_notes("add a blue tint"));
        assert!(noted.starts_with("Additional context: add a blue tint. Transform this image"));
    }

    #[test]
    fn cartoon_prompt_never_mentions_product_placement() {
        let mut s = StudioSettings::for_preset(Preset::Cartoon);
        // Foreign fields are dropped, so a product-only value cannot leak.
        s.set_option("placement", "Minimalist Flatlay").unwrap();
        let p = build_prompt(&s);
        assert!(!p.contains("Minimalist Flatlay"));
        assert!(!p.contains("Placement"));
        assert!(p.contains("3D Render style illustration"));
        assert!(p.contains("Color palette: Vibrant."));
    }

    #[test]
    fn each_preset_only_mentions_its_own_defaults() {
        for preset in Preset::SELECTABLE {
            let p = build_prompt(&StudioSettings::for_preset(preset));
            for other in Preset::SELECTABLE.into_iter().filter(|o| *o != preset) {
                for field in other.option_fields() {
                    let own = preset.option_fields().iter().any(|f| f.default == field.default);
                    if !own {
                        assert!(!p.contains(field.default), "{preset} prompt leaked {}", field.default);
                    }
                }
            }
        }
    }

    #[test]
    fn gift_hamper_prompt_names_wedding_hampers() {
        let p = build_prompt(&StudioSettings::for_preset(Preset::GiftHamper));
        assert!(p.starts_with("Transform this image into a beautiful professional seserahan (wedding gift hamper) photography."));
        assert!(p.contains("Theme: Elegant Gold."));
        assert!(p.contains("Decoration Style: Floral."));
    }

    #[test]
    fn enhance_is_the_generic_fallback() {
        let s = StudioSettings::for_preset(Preset::parse("mystery")).with_notes("brighter");
        assert_eq!(build_prompt(&s), "Additional context: brighter. Enhance this image professionally.");
    }
}

// src/ui/panel.rs
//! Tunables panel
//!
//! Light, indirect lighting, material and display controls, edited in place.

use crate::gfx::{
    light::{SpotLight, MAX_CUTOFF, MIN_CUTOFF},
    rendering::{LightingMode, LightingSettings},
    resources::{DitherPattern, MaterialLibrary, TargetId, SAVEABLE_TARGETS},
};

/// Everything the tunables panel edits
pub struct Tunables<'a> {
    pub light: &'a mut SpotLight,
    pub settings: &'a mut LightingSettings,
    pub materials: &'a mut MaterialLibrary,
    /// Upper bound of the sample count slider
    pub kernel_size: u32,
    pub vsync: &'a mut bool,
}

/// What changed this frame and needs a follow-up outside the panel
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PanelChanges {
    pub materials: bool,
    pub vsync: bool,
    /// Target to write to disk after this frame
    pub save: Option<TargetId>,
}

/// Default tunables panel
///
/// # Arguments
/// * `ui` - ImGui UI context
/// * `tunables` - Values edited in place
pub fn tunables_panel(ui: &imgui::Ui, tunables: Tunables<'_>) -> PanelChanges {
    let mut changes = PanelChanges::default();
    let display_size = ui.io().display_size;
    // Guard against invalid display size that could cause crashes
    if display_size[0] <= 0.0 || display_size[1] <= 0.0 {
        return changes;
    }
    let panel_width = (display_size[0] * 0.3).clamp(320.0, 420.0);

    let Tunables {
        light,
        settings,
        materials,
        kernel_size,
        vsync,
    } = tunables;

    ui.window("Tunables")
        .size([panel_width, display_size[1] * 0.8], imgui::Condition::FirstUseEver)
        .position([20.0, 20.0], imgui::Condition::FirstUseEver)
        .resizable(true)
        .collapsible(true)
        .build(|| {
            render_lighting_controls(ui, settings, kernel_size);
            ui.separator();
            render_light_controls(ui, light);
            ui.separator();
            changes.materials = render_material_controls(ui, materials);
            ui.separator();
            changes.save = render_save_buttons(ui);
            ui.separator();
            changes.vsync = ui.checkbox("VSync", vsync);
            ui.text(format!("{:.1} FPS", ui.io().framerate));
        });

    changes
}

fn render_lighting_controls(ui: &imgui::Ui, settings: &mut LightingSettings, kernel_size: u32) {
    if !ui.collapsing_header("Indirect Lighting", imgui::TreeNodeFlags::DEFAULT_OPEN) {
        return;
    }

    let mut indirect = settings.mode != LightingMode::DirectOnly;
    let mut indirect_only = settings.mode == LightingMode::IndirectOnly;
    let toggled = ui.checkbox("Indirect", &mut indirect);
    if toggled | ui.checkbox("Indirect only", &mut indirect_only) {
        settings.mode = mode_from_toggles(indirect, indirect_only);
    }

    ui.text("Dither:");
    ui.same_line();
    for (label, pattern) in [
        ("4x4", DitherPattern::FourByFour),
        ("8x8", DitherPattern::EightByEight),
        ("Off", DitherPattern::Off),
    ] {
        ui.radio_button(label, &mut settings.dither, pattern);
        ui.same_line();
    }
    ui.new_line();

    if ui.slider("Samples", 1, kernel_size.max(1), &mut settings.sample_count) {
        settings.sample_count = settings.sample_count.min(kernel_size);
    }
    ui.slider("Radius (texels)", 1.0, 1000.0, &mut settings.sample_radius);
    ui.slider("Amount", 0.0, 10.0, &mut settings.indirect_amount);
}

/// Light matrices are refreshed by the frame loop, not here
fn render_light_controls(ui: &imgui::Ui, light: &mut SpotLight) {
    if !ui.collapsing_header("Spot Light", imgui::TreeNodeFlags::DEFAULT_OPEN) {
        return;
    }

    ui.checkbox("Flashlight", &mut light.flashlight);
    ui.disabled(light.flashlight, || {
        vector_sliders(ui, "Position", &mut light.position, -500.0, 500.0);
        vector_sliders(ui, "Target", &mut light.target, -500.0, 500.0);
    });

    let mut color: [f32; 3] = light.color.into();
    if ui.color_edit3("Color", &mut color) {
        light.color = color.into();
    }
    ui.slider("Intensity", 0.0, 10.0, &mut light.intensity);
    ui.slider("Range", 1.0, 2000.0, &mut light.range);
    ui.slider_config("Bias", 0.0, 0.01)
        .display_format("%.5f")
        .build(&mut light.bias);

    if ui.slider("Inner cutoff", 0.0, MAX_CUTOFF, &mut light.inner_cutoff) {
        light.outer_cutoff = light.outer_cutoff.max(light.inner_cutoff);
    }
    if ui.slider("Outer cutoff", MIN_CUTOFF, MAX_CUTOFF, &mut light.outer_cutoff) {
        light.inner_cutoff = light.inner_cutoff.min(light.outer_cutoff);
    }
}

fn render_save_buttons(ui: &imgui::Ui) -> Option<TargetId> {
    if !ui.collapsing_header("Save Targets", imgui::TreeNodeFlags::empty()) {
        return None;
    }

    let mut clicked = None;
    for (id, stem) in SAVEABLE_TARGETS {
        if ui.button(button_label(stem)) {
            clicked = Some(id);
        }
    }
    clicked
}

/// "GBuffer_WorldPos" reads as "GBuffer WorldPos"
fn button_label(stem: &str) -> String {
    stem.replace('_', " ")
}

fn render_material_controls(ui: &imgui::Ui, materials: &mut MaterialLibrary) -> bool {
    if materials.is_empty() || !ui.collapsing_header("Materials", imgui::TreeNodeFlags::empty()) {
        return false;
    }

    let mut changed = false;
    for material in materials.iter_mut() {
        changed |= ui.color_edit3(&material.name, &mut material.diffuse);
    }
    changed
}

fn vector_sliders(
    ui: &imgui::Ui,
    label: &str,
    value: &mut cgmath::Vector3<f32>,
    min: f32,
    max: f32,
) {
    let mut components: [f32; 3] = (*value).into();
    if ui.slider_config(label, min, max).build_array(&mut components) {
        *value = components.into();
    }
}

/// Maps the panel's two checkboxes onto a lighting mode
fn mode_from_toggles(indirect: bool, indirect_only: bool) -> LightingMode {
    match (indirect, indirect_only) {
        (false, _) => LightingMode::DirectOnly,
        (true, true) => LightingMode::IndirectOnly,
        (true, false) => LightingMode::Full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_toggles() {
        assert_eq!(mode_from_toggles(true, false), LightingMode::Full);
        assert_eq!(mode_from_toggles(true, true), LightingMode::IndirectOnly);
        assert_eq!(mode_from_toggles(false, false), LightingMode::DirectOnly);
        assert_eq!(mode_from_toggles(false, true), LightingMode::DirectOnly);
    }

    #[test]
    fn test_every_mode_round_trips_through_toggles() {
        for mode in LightingMode::ALL {
            let indirect = mode != LightingMode::DirectOnly;
            let indirect_only = mode == LightingMode::IndirectOnly;
            assert_eq!(mode_from_toggles(indirect, indirect_only), mode);
        }
    }

    #[test]
    fn test_save_buttons_have_distinct_labels() {
        let labels: std::collections::HashSet<String> =
            SAVEABLE_TARGETS.iter().map(|(_, stem)| button_label(stem)).collect();
        assert_eq!(labels.len(), SAVEABLE_TARGETS.len());
        assert!(labels.contains("RSM Flux"));
    }
}

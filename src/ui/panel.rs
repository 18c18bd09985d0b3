// src/ui/panel.rs
//! Dear ImGui host for the parameter panel
//!
//! Draws every bound parameter with the widget matching its kind and reports
//! what the user did as [`Interaction`]s. Nothing here touches the scene; the
//! caller feeds the interactions to [`ParameterPanel::apply`].

use imgui::{Condition, TreeNodeFlags};

use crate::gfx::scene::{Color, SceneStatistics, Value};

use super::params::{Interaction, ParamKind, ParamView, ParameterPanel};

/// Draws the panel window and collects this frame's interactions
///
/// # Arguments
/// * `ui` - ImGui frame being built
/// * `panel` - Parameters to draw, with values from the last refresh
/// * `statistics` - Optional scene summary shown under the parameters
pub fn draw_panel(
    ui: &imgui::Ui,
    panel: &ParameterPanel,
    statistics: Option<&SceneStatistics>,
) -> Vec<Interaction> {
    let mut interactions = Vec::new();
    if !panel.is_visible() {
        return interactions;
    }

    let display_size = ui.io().display_size;
    // Minimised window
    if display_size[0] <= 0.0 || display_size[1] <= 0.0 {
        return interactions;
    }
    let width = panel.width().min(display_size[0]);
    let height = (display_size[1] * 0.6).max(200.0).min(display_size[1]);

    ui.window(panel.title())
        .size([width, height], Condition::FirstUseEver)
        .position([display_size[0] - width - 20.0, 20.0], Condition::FirstUseEver)
        .resizable(true)
        .collapsible(true)
        .build(|| {
            let params: Vec<ParamView<'_>> = panel.params().collect();

            for param in params.iter().filter(|p| p.folder.is_none()) {
                draw_param(ui, param, &mut interactions);
            }

            let mut folders: Vec<&str> = Vec::new();
            for folder in params.iter().filter_map(|p| p.folder) {
                if !folders.contains(&folder) {
                    folders.push(folder);
                }
            }
            for folder in folders {
                if ui.collapsing_header(folder, TreeNodeFlags::DEFAULT_OPEN) {
                    let _folder_id = ui.push_id(folder);
                    for param in params.iter().filter(|p| p.folder == Some(folder)) {
                        draw_param(ui, param, &mut interactions);
                    }
                }
            }

            if let Some(stats) = statistics {
                ui.separator();
                ui.text_disabled(format!(
                    "{} nodes, {} visible, {} triangles",
                    stats.nodes, stats.visible, stats.triangles
                ));
            }
        });

    interactions
}

fn draw_param(ui: &imgui::Ui, param: &ParamView<'_>, out: &mut Vec<Interaction>) {
    // Labels can repeat across targets; the id keeps widgets apart
    let label = format!("{}##{}", param.label, param.id);

    if let ParamKind::Action = param.kind {
        if ui.button(&label) {
            out.push(Interaction::Invoke(param.id));
        }
        return;
    }

    let Some(value) = param.value else {
        ui.text_disabled(format!("{} (detached)", param.label));
        return;
    };

    match (param.kind, value) {
        (ParamKind::Number { min: Some(min), max: Some(max), .. }, Value::Float(current)) => {
            let mut v = *current;
            if ui.slider_config(&label, *min, *max).build(&mut v) {
                out.push(Interaction::Input(param.id, Value::Float(v)));
            }
            if ui.is_item_deactivated_after_edit() {
                out.push(Interaction::Commit(param.id));
            }
        }
        (ParamKind::Number { step, .. }, Value::Float(current)) => {
            let mut v = *current;
            if ui.input_float(&label, &mut v).step(step.unwrap_or(0.0)).build() {
                out.push(Interaction::Input(param.id, Value::Float(v)));
            }
            if ui.is_item_deactivated_after_edit() {
                out.push(Interaction::Commit(param.id));
            }
        }
        (ParamKind::Color, Value::Color(current)) => {
            let mut rgb = current.to_array();
            if ui.color_edit3(&label, &mut rgb) {
                out.push(Interaction::Input(param.id, Value::Color(Color::from_array(rgb))));
            }
            if ui.is_item_deactivated_after_edit() {
                out.push(Interaction::Commit(param.id));
            }
        }
        (ParamKind::Text, Value::Text(current)) => {
            let mut text = current.clone();
            if ui.input_text(&label, &mut text).build() {
                out.push(Interaction::Input(param.id, Value::Text(text)));
            }
            if ui.is_item_deactivated_after_edit() {
                out.push(Interaction::Commit(param.id));
            }
        }
        // Discrete controls finish their edit in the same click
        (ParamKind::Toggle, Value::Bool(current)) => {
            let mut checked = *current;
            if ui.checkbox(&label, &mut checked) {
                out.push(Interaction::Input(param.id, Value::Bool(checked)));
                out.push(Interaction::Commit(param.id));
            }
        }
        (ParamKind::Choice(choices), Value::Text(current)) => {
            let mut index = choices.iter().position(|c| c == current).unwrap_or(0);
            if ui.combo_simple_string(&label, &mut index, choices) {
                if let Some(choice) = choices.get(index) {
                    out.push(Interaction::Input(param.id, Value::Text(choice.clone())));
                    out.push(Interaction::Commit(param.id));
                }
            }
        }
        _ => ui.text_disabled(format!("{}: {:?}", param.label, value)),
    }
}

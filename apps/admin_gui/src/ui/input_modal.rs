//! Confirmation dialog with a single editable value.

use eframe::egui;

pub struct InputModalProps<'a> {
    pub title: &'a str,
    pub text: &'a str,
    pub sub_text: Option<&'a str>,
    pub placeholder: &'a str,
    pub confirm_label: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalResponse {
    Confirmed(String),
    Closed,
}

/// Keeps the user's edits until the caller supplies a different default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputModal {
    value: String,
    default: String,
}

impl InputModal {
    pub fn new(default: impl Into<String>) -> Self {
        let default = default.into();
        Self {
            value: default.clone(),
            default,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut String {
        &mut self.value
    }

    /// Replaces the edited value only when `default` differs from the last one seen.
    pub fn sync_default(&mut self, default: &str) {
        if self.default != default {
            self.default = default.to_string();
            self.value = default.to_string();
        }
    }

    pub fn confirm(&self) -> ModalResponse {
        ModalResponse::Confirmed(self.value.clone())
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        props: &InputModalProps<'_>,
        default: &str,
    ) -> Option<ModalResponse> {
        self.sync_default(default);

        let mut response = None;
        let mut open = true;
        egui::Window::new(props.title)
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(props.text);
                if let Some(sub_text) = props.sub_text {
                    ui.small(sub_text);
                }
                let edit = ui.add(
                    egui::TextEdit::singleline(&mut self.value)
                        .hint_text(props.placeholder)
                        .desired_width(280.0),
                );
                let submitted =
                    edit.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));

                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    if ui.button(props.confirm_label).clicked() || submitted {
                        response = Some(self.confirm());
                    }
                    if ui.button("Cancel").clicked() {
                        response = Some(ModalResponse::Closed);
                    }
                });
            });

        if !open {
            response = Some(ModalResponse::Closed);
        }
        response
    }
}

#[cfg(test)]
#[path = "tests/input_modal_tests.rs"]
mod tests;

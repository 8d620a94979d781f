//! # Main Display Module
//!
//! Layout of the single PitchTap window: live pitch readout, the note
//! check panel, the metronome panel and the evaluator log.

use iced::widget::{Space, button, column, container, row, text};
use iced::{Alignment, Element, Length};

use crate::{AppDisplayData, CheckOutcome, Message};

/// Creates the complete main application view.
pub fn create_main_view(data: &AppDisplayData, metronome_running: bool) -> Element<'static, Message> {
    let title = text("PitchTap").size(28);

    let content = column![
        title,
        Space::with_height(20),
        create_readout_panel(data),
        Space::with_height(10),
        row![
            create_check_panel(data),
            Space::with_width(10),
            create_metronome_panel(data, metronome_running),
        ]
        .align_y(Alignment::Start),
        Space::with_height(10),
        create_diagnostics_panel(data),
    ]
    .spacing(10)
    .padding(20);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

/// Live pitch and amplitude labels.
fn create_readout_panel(data: &AppDisplayData) -> Element<'static, Message> {
    let (pitch, amp) = readout_labels(data);
    row![text(pitch).size(22), Space::with_width(30), text(amp).size(22)].into()
}

fn readout_labels(data: &AppDisplayData) -> (String, String) {
    if !data.audio_worker_active {
        return ("No audio input".to_string(), "Amp: --".to_string());
    }
    match data.last_sample {
        Some(sample) => (
            format!("Pitch: {:.2} Hz", sample.frequency),
            format!("Amp: {:.3}", sample.amplitude),
        ),
        None => ("Pitch: --".to_string(), "Amp: --".to_string()),
    }
}

fn create_check_panel(data: &AppDisplayData) -> Element<'static, Message> {
    let target_label = match &data.target {
        Some(target) => format!("Frequency to check: {} ({:.2} Hz)", target.name, target.frequency),
        None => "Frequency to check: --".to_string(),
    };

    let actual_label = match &data.outcome {
        None => "Actual: --".to_string(),
        Some(CheckOutcome::Listening) => "Listening...".to_string(),
        Some(CheckOutcome::Passed { checked }) => format!("Actual: {:.2} Hz - passed", checked),
        Some(CheckOutcome::Missed { checked }) => format!("Actual: {:.2} Hz - did not pass", checked),
        Some(CheckOutcome::AutoFail) => "Nothing near the target - auto fail".to_string(),
    };

    let mut cancel = button(text("Cancel"));
    if data.outcome == Some(CheckOutcome::Listening) {
        cancel = cancel.on_press(Message::CancelCheck);
    }

    container(
        column![
            text("Note check").size(18),
            text(target_label),
            text(actual_label),
            row![button(text("Check note")).on_press(Message::CheckNote), cancel].spacing(10),
        ]
        .spacing(8)
        .padding(15),
    )
    .width(Length::FillPortion(2))
    .into()
}

fn create_metronome_panel(data: &AppDisplayData, running: bool) -> Element<'static, Message> {
    let beat_label = match data.metronome_beat {
        Some(position) => {
            let accent = if position.is_downbeat { "●" } else { "○" };
            format!("{} Beat {} ({})", accent, position.beat + 1, position.beat_in_bar + 1)
        }
        None => "Stopped".to_string(),
    };
    let toggle_label = if running { "Stop metronome" } else { "Start metronome" };

    container(
        column![
            text("Metronome").size(18),
            text(beat_label).size(24),
            button(text(toggle_label)).on_press(Message::ToggleMetronome),
        ]
        .spacing(8)
        .padding(15),
    )
    .width(Length::FillPortion(1))
    .into()
}

fn create_diagnostics_panel(data: &AppDisplayData) -> Element<'static, Message> {
    let lines = data
        .diagnostics
        .iter()
        .fold(column![text("Evaluator log").size(18)].spacing(2), |col, line| {
            col.push(text(line.clone()).size(14))
        });
    container(lines.padding(15)).width(Length::Fill).into()
}


#[cfg(test)]
mod tests {
    use super::*;
    use pitchtap_core::PitchSample;

    #[test]
    fn readout_without_audio_input() {
        let mut data = AppDisplayData {
            audio_worker_active: true,
            last_sample: Some(PitchSample::new(440.0, 0.5)),
            ..AppDisplayData::default()
        };
        assert_eq!(readout_labels(&data), ("Pitch: 440.00 Hz".to_string(), "Amp: 0.500".to_string()));

        data.audio_worker_active = false;
        assert_eq!(readout_labels(&data).0, "No audio input");
    }
}

mod collaborators;
mod plan;
mod progress;
mod state;
mod worker;

use iced::widget::{button, column, container, row, text, text_input, pick_list};
use iced::{Alignment, Element, Length, Sandbox, Settings};
use state::{AppState, OperationMode};

pub fn main() -> iced::Result {
    GuiApp::run(Settings::default())
}

#[derive(Debug, Clone)]
pub enum Message {
    PlanPathChanged(String),
    DataDirChanged(String),
    ModeChanged(OperationMode),
    BrowsePlanPressed,
    BrowseDataDirPressed,
    StartPressed,
}

#[derive(Debug, Clone)]
pub struct JobSummary {
    pub total_items: usize,
    pub done_count: usize,
    pub failed_count: usize,
    pub failed_items: Vec<(String, String)>,
}

pub struct GuiApp {
    state: AppState,
}

impl Sandbox for GuiApp {
    type Message = Message;

    fn new() -> Self {
        GuiApp { state: AppState::new() }
    }

    fn title(&self) -> String {
        "zim - Migration Engine".to_string()
    }

    fn update(&mut self, message: Message) {
        match message {
            Message::PlanPathChanged(path) => {
                self.state.plan_path = path;
                self.state.error_message = None;
            }
            Message::DataDirChanged(path) => {
                self.state.data_dir = path;
                self.state.error_message = None;
            }
            Message::ModeChanged(mode) => {
                self.state.selected_mode = mode;
            }
            Message::BrowsePlanPressed => {
                if let Some(path) = rfd::FileDialog::new().pick_file() {
                    self.state.plan_path = path.display().to_string();
                    self.state.error_message = None;
                }
            }
            Message::BrowseDataDirPressed => {
                if let Some(path) = rfd::FileDialog::new().pick_folder() {
                    self.state.data_dir = path.display().to_string();
                    self.state.error_message = None;
                }
            }
            Message::StartPressed => {
                if self.state.plan_path.trim().is_empty() {
                    self.state.error_message = Some(match self.state.selected_mode {
                        OperationMode::Capture => "Plan path is required".to_string(),
                        OperationMode::Restore => "Job file path is required".to_string(),
                    });
                    return;
                }
                if self.state.data_dir.trim().is_empty() {
                    self.state.error_message = Some("Data directory is required".to_string());
                    return;
                }

                self.state.is_running = true;
                self.state.error_message = None;
                self.state.last_job_summary = None;

                worker::spawn_job(self.state.selected_mode, self.state.plan_path.clone(), self.state.data_dir.clone());
            }
        }
    }

    fn view(&self) -> Element<Message> {
        let plan_label = match self.state.selected_mode {
            OperationMode::Capture => "Capture Plan",
            OperationMode::Restore => "Job File",
        };

        let input_section = column![
            text(plan_label),
            row![
                text_input("Enter path", &self.state.plan_path)
                    .on_input(Message::PlanPathChanged)
                    .width(Length::Fill),
                button("Browse...").on_press(Message::BrowsePlanPressed),
            ]
            .spacing(10)
            .align_items(Alignment::Center),
            text("Data Directory"),
            row![
                text_input("Enter directory", &self.state.data_dir)
                    .on_input(Message::DataDirChanged)
                    .width(Length::Fill),
                button("Browse...").on_press(Message::BrowseDataDirPressed),
            ]
            .spacing(10)
            .align_items(Alignment::Center),
        ]
        .spacing(10)
        .padding(10);

        let mode_options = vec![OperationMode::Capture, OperationMode::Restore];
        let options_column = column![text("Mode"), pick_list(mode_options, Some(self.state.selected_mode), Message::ModeChanged),]
            .spacing(10)
            .padding(10);

        let start_button = button(if self.state.is_running { "Running..." } else { "Start" })
            .on_press_maybe(if self.state.is_running { None } else { Some(Message::StartPressed) })
            .padding(10);

        let progress_percent = if self.state.bytes_total > 0 {
            (self.state.bytes_so_far as f32 / self.state.bytes_total as f32 * 100.0) as u32
        } else {
            0
        };

        let progress_section: Element<Message> = if self.state.is_running {
            column![
                text(format!("Progress: {}%", progress_percent)),
                text(format!("{} / {} items", self.state.completed_count + self.state.failed_count, self.state.total_items)),
                text(format!("Completed: {} | Failed: {}", self.state.completed_count, self.state.failed_count)),
                if !self.state.current_item_name.is_empty() {
                    text(format!("Current: {}", self.state.current_item_name))
                } else {
                    text("")
                },
            ]
            .spacing(10)
            .padding(10)
            .into()
        } else if let Some(summary) = &self.state.last_job_summary {
            let mut col = column![
                text("Run Complete"),
                text(format!("Completed: {} | Failed: {}", summary.done_count, summary.failed_count)),
            ]
            .spacing(5);

            if !summary.failed_items.is_empty() {
                col = col.push(text("Failed Items (first 10):"));
                for (name, err) in summary.failed_items.iter().take(10) {
                    col = col.push(text(format!("  {}: {}", name, err)));
                }
            }

            col.spacing(10).padding(10).into()
        } else {
            text("Ready").into()
        };

        let error_section: Element<Message> = if let Some(error) = &self.state.error_message {
            container(text(format!("ERROR: {}", error))).padding(10).into()
        } else {
            text("").into()
        };

        column![
            text("zim - Migration Engine").size(24),
            input_section,
            options_column,
            start_button,
            progress_section,
            error_section,
        ]
        .spacing(20)
        .padding(20)
        .into()
    }
}

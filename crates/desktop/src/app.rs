use std::path::PathBuf;
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};
use iced::widget::{button, column, container, image, mouse_area, pick_list, row, text, toggler};
use iced::{Element, Length, Point, Subscription, Task, Theme};

use noseline_core::capture::infrastructure::ffmpeg_capture::{CaptureInput, FfmpegCapture};
use noseline_core::config::TrackerConfig;
use noseline_core::detection::domain::detector::DetectorSet;
use noseline_core::rendering::overlay;
use noseline_core::session::session_logger::NullSessionLogger;
use noseline_core::session::tracking_session::TrackingSession;
use noseline_core::shared::constants::{STATUS_CAMERA_RUNNING, STATUS_CAMERA_STOPPED};
use noseline_core::tracking::domain::attention_tracker::AttentionTracker;
use noseline_core::tracking::domain::band::BandCommand;
use noseline_core::tracking::domain::landmark_estimator::LandmarkEstimator;
use noseline_core::tracking::domain::tracking_result::Verdict;

use crate::settings::{Appearance, Settings};
use crate::theme;
use crate::workers::detector_loader::{self, LoaderMessage};

/// Preview width in logical pixels; the frame is scaled to fit.
const DISPLAY_WIDTH: f32 = 640.0;

const CAMERA_READ_FAILED: &str = "Failed to read a frame from the camera.";

#[derive(Debug, Clone)]
pub enum Message {
    Tick,
    Start,
    Stop,
    DetectionToggled(bool),
    MirrorToggled(bool),
    PointerMoved(Point),
    PointerPressed,
    PointerReleased,
    SelectPoseModel,
    PoseModelSelected(Option<PathBuf>),
    AppearanceChanged(Appearance),
    HighContrastChanged(bool),
    DialogClosed,
    PollSystemTheme,
}

struct Preview {
    handle: image::Handle,
    width: u32,
    height: u32,
}

pub struct App {
    settings: Settings,
    config: TrackerConfig,
    session: Option<TrackingSession>,
    loader: Option<Receiver<LoaderMessage>>,
    preview: Option<Preview>,
    status: String,
    verdict: Verdict,
    pointer: Option<Point>,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let settings = Settings::load();
        let config = settings.tracker_config();
        let loader = detector_loader::spawn(config.detectors.clone());
        (
            Self {
                settings,
                config,
                session: None,
                loader: Some(loader),
                preview: None,
                status: "Loading detectors\u{2026}".to_string(),
                verdict: Verdict::Unknown,
                pointer: None,
            },
            Task::none(),
        )
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => return self.tick(),
            Message::Start => return self.start(),
            Message::Stop => self.stop(),
            Message::DetectionToggled(enabled) => {
                self.settings.detect_faces = enabled;
                if let Some(session) = &mut self.session {
                    session.set_detection_enabled(enabled);
                }
                self.settings.save();
            }
            Message::MirrorToggled(mirror) => {
                self.settings.mirror = mirror;
                if let Some(session) = &mut self.session {
                    session.set_mirror(mirror);
                }
                self.settings.save();
            }
            Message::PointerMoved(point) => {
                self.pointer = Some(point);
                if let Some(y) = self.frame_y(point) {
                    self.apply_band(BandCommand::UpdatePosition { y });
                }
            }
            Message::PointerPressed => {
                if let Some(y) = self.pointer.and_then(|p| self.frame_y(p)) {
                    self.apply_band(BandCommand::BeginDrag { y });
                }
            }
            Message::PointerReleased => {
                if self.apply_band(BandCommand::EndDrag) {
                    if let Some(session) = &self.session {
                        self.settings.band_y = Some(session.band().position());
                        self.settings.save();
                    }
                }
            }
            Message::SelectPoseModel => {
                return Task::perform(
                    async {
                        rfd::AsyncFileDialog::new()
                            .set_title("Select pose model")
                            .add_filter("ONNX model", &["onnx"])
                            .pick_file()
                            .await
                            .map(|h| h.path().to_path_buf())
                    },
                    Message::PoseModelSelected,
                );
            }
            Message::PoseModelSelected(Some(path)) => {
                self.settings.pose_model = Some(path);
                self.settings.save();
                self.reload_detectors();
            }
            Message::PoseModelSelected(None) => {}
            Message::AppearanceChanged(appearance) => {
                self.settings.appearance = appearance;
                self.settings.save();
            }
            Message::HighContrastChanged(enabled) => {
                self.settings.high_contrast = enabled;
                self.settings.save();
            }
            Message::DialogClosed => {}
            Message::PollSystemTheme => {
                // Theme is resolved fresh in theme() on every render.
            }
        }
        Task::none()
    }

    fn start(&mut self) -> Task<Message> {
        let Some(session) = &mut self.session else {
            self.status = "Detectors are still loading".to_string();
            return Task::none();
        };
        match session.start() {
            Ok(()) => {
                self.status = STATUS_CAMERA_RUNNING.to_string();
                Task::none()
            }
            Err(e) => {
                log::error!("{e}");
                self.status = STATUS_CAMERA_STOPPED.to_string();
                error_dialog(&camera_open_failed(&self.camera_input()))
            }
        }
    }

    fn stop(&mut self) {
        if let Some(session) = &mut self.session {
            session.stop();
        }
        self.preview = None;
        self.verdict = Verdict::Unknown;
        self.status = STATUS_CAMERA_STOPPED.to_string();
    }

    fn tick(&mut self) -> Task<Message> {
        let task = self.poll_loader();
        let Some(session) = self.session.as_mut().filter(|s| s.is_running()) else {
            return task;
        };
        match session.tick() {
            Ok(tick) => {
                let mut frame = tick.frame;
                if session.detection_enabled() {
                    overlay::draw_tracking(&mut frame, &tick.result, &tick.band);
                } else {
                    overlay::draw_band(&mut frame, &tick.band);
                }
                self.preview = Some(Preview {
                    handle: image::Handle::from_rgba(frame.width(), frame.height(), frame.to_rgba()),
                    width: frame.width(),
                    height: frame.height(),
                });
                self.status = tick.result.status;
                self.verdict = tick.result.verdict;
                task
            }
            Err(e) => {
                log::error!("{e}");
                self.preview = None;
                self.verdict = Verdict::Unknown;
                self.status = STATUS_CAMERA_STOPPED.to_string();
                Task::batch([task, error_dialog(CAMERA_READ_FAILED)])
            }
        }
    }

    fn poll_loader(&mut self) -> Task<Message> {
        let Some(loader) = &self.loader else {
            return Task::none();
        };
        let (detectors, failure) = match loader.try_recv() {
            Ok(LoaderMessage::Loaded(detectors)) => (detectors, None),
            Ok(LoaderMessage::Failed(e)) => (DetectorSet::new(), Some(e)),
            Err(TryRecvError::Empty) => return Task::none(),
            Err(TryRecvError::Disconnected) => (DetectorSet::new(), Some("Detector loader stopped".into())),
        };
        self.loader = None;
        self.install_session(detectors);
        match failure {
            Some(e) => error_dialog(&e),
            None => Task::none(),
        }
    }

    fn install_session(&mut self, detectors: DetectorSet) {
        let estimator = LandmarkEstimator::new(self.config.nose_proxy_fraction).unwrap_or_default();
        let mut session = TrackingSession::new(
            Box::new(FfmpegCapture::new(self.camera_input())),
            detectors,
            AttentionTracker::new(estimator),
            self.config.band_controller(),
            Box::new(NullSessionLogger),
        )
        .with_mirror(self.settings.mirror);
        session.set_detection_enabled(self.settings.detect_faces);
        self.session = Some(session);
        self.status = STATUS_CAMERA_STOPPED.to_string();
    }

    fn camera_input(&self) -> CaptureInput {
        CaptureInput::camera(
            self.settings.camera_format.clone(),
            self.settings.camera_device.clone(),
        )
    }

    fn reload_detectors(&mut self) {
        self.stop();
        self.session = None;
        self.config = self.settings.tracker_config();
        self.loader = Some(detector_loader::spawn(self.config.detectors.clone()));
        self.status = "Loading detectors\u{2026}".to_string();
    }

    fn apply_band(&mut self, command: BandCommand) -> bool {
        self.session
            .as_mut()
            .is_some_and(|session| session.apply_band(command))
    }

    /// Pointer y in frame pixels, if a frame is on screen.
    fn frame_y(&self, point: Point) -> Option<i32> {
        self.preview
            .as_ref()
            .map(|p| to_frame_y(point.y, display_height(p.width, p.height), p.height))
    }

    pub fn view(&self) -> Element<'_, Message> {
        let running = self.session.as_ref().is_some_and(TrackingSession::is_running);

        let controls = row![
            if running {
                button(text("Stop")).on_press(Message::Stop).style(button::danger)
            } else {
                button(text("Start")).on_press(Message::Start).style(button::primary)
            },
            toggler(self.settings.detect_faces)
                .label("Detect faces")
                .on_toggle(Message::DetectionToggled),
            toggler(self.settings.mirror)
                .label("Mirror")
                .on_toggle(Message::MirrorToggled),
            button(text("Pose model\u{2026}"))
                .on_press(Message::SelectPoseModel)
                .style(button::secondary),
            pick_list(Appearance::ALL, Some(self.settings.appearance), Message::AppearanceChanged),
            toggler(self.settings.high_contrast)
                .label("High contrast")
                .on_toggle(Message::HighContrastChanged),
        ]
        .spacing(12)
        .align_y(iced::Alignment::Center);

        let preview: Element<'_, Message> = match &self.preview {
            Some(preview) => mouse_area(
                image(preview.handle.clone())
                    .width(Length::Fixed(DISPLAY_WIDTH))
                    .height(Length::Fixed(display_height(preview.width, preview.height))),
            )
            .on_move(Message::PointerMoved)
            .on_press(Message::PointerPressed)
            .on_release(Message::PointerReleased)
            .into(),
            None => container(text(STATUS_CAMERA_STOPPED))
                .width(Length::Fixed(DISPLAY_WIDTH))
                .height(Length::Fixed(DISPLAY_WIDTH * 0.75))
                .center_x(Length::Fixed(DISPLAY_WIDTH))
                .center_y(Length::Fixed(DISPLAY_WIDTH * 0.75))
                .into(),
        };

        let status_color = theme::verdict_color(&self.theme(), self.verdict);
        let status = text(&self.status).size(15).color(status_color);

        column![controls, preview, status]
            .spacing(12)
            .padding(16)
            .into()
    }

    pub fn theme(&self) -> Theme {
        theme::resolve_theme(self.settings.appearance, self.settings.high_contrast)
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let running = self.session.as_ref().is_some_and(TrackingSession::is_running);
        let ticks = if running || self.loader.is_some() {
            iced::time::every(self.config.frame_interval()).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };
        let theme_poll = if self.settings.appearance == Appearance::System {
            iced::time::every(Duration::from_secs(2)).map(|_| Message::PollSystemTheme)
        } else {
            Subscription::none()
        };
        Subscription::batch([ticks, theme_poll])
    }
}

fn camera_open_failed(input: &CaptureInput) -> String {
    format!("Could not open camera ({input}). Check that a camera is connected and not in use.")
}

fn error_dialog(message: &str) -> Task<Message> {
    let dialog = rfd::AsyncMessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title("Noseline")
        .set_description(message.to_string());
    Task::perform(async move { dialog.show().await }, |_| Message::DialogClosed)
}

fn display_height(frame_width: u32, frame_height: u32) -> f32 {
    if frame_width == 0 {
        return 0.0;
    }
    DISPLAY_WIDTH * frame_height as f32 / frame_width as f32
}

/// Maps a y offset inside the preview widget to frame pixels.
fn to_frame_y(widget_y: f32, display_height: f32, frame_height: u32) -> i32 {
    if display_height <= 0.0 {
        return 0;
    }
    (widget_y * frame_height as f32 / display_height).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_height_keeps_aspect() {
        assert_eq!(display_height(640, 480), 480.0);
        assert_eq!(display_height(1280, 720), 360.0);
        assert_eq!(display_height(0, 480), 0.0);
    }

    #[test]
    fn test_camera_open_failed_names_the_device() {
        let input = CaptureInput::camera(Some("v4l2".into()), Some("/dev/video3".into()));
        let message = camera_open_failed(&input);
        assert!(message.contains("v4l2 device /dev/video3"), "{message}");
    }

    #[test]
    fn test_to_frame_y_scales_to_frame() {
        assert_eq!(to_frame_y(180.0, 360.0, 720), 360);
        assert_eq!(to_frame_y(0.0, 360.0, 720), 0);
        assert_eq!(to_frame_y(10.0, 0.0, 720), 0);
    }
}

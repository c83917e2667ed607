use crate::common::{ImageBlob, NormalizedImage};
use crate::config::{NormalizerSettings, Settings};
use crate::error::{AppError, ErrorKind};
use crate::intake::{CameraDevice, CameraSession, FacingMode, SelectedFile, select_file};
use crate::pipeline::classifier::{ClassificationResult, ClassificationService};
use crate::pipeline::normalizer::normalize_async;
use crate::pipeline::presenter::{DisplayConfig, present};
use std::mem;
use tower::ServiceExt;
use tracing::{debug, error, info, instrument};

/// An acquired image together with its normalized copy.
#[derive(Debug, Clone)]
pub struct Preview {
    pub blob: ImageBlob,
    pub normalized: NormalizedImage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AppError> for ErrorReport {
    fn from(error: &AppError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

pub enum WorkflowState {
    Idle,
    /// Camera stream open; leaving this state releases it.
    Capturing(CameraSession),
    PreviewReady(Preview),
    Analyzing {
        preview: Preview,
        generation: u64,
    },
    ResultReady {
        preview: Preview,
        result: ClassificationResult,
        display: DisplayConfig,
    },
    Error {
        report: ErrorReport,
        /// Kept so the user can retry the analysis without re-acquiring.
        preview: Option<Preview>,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Capturing(_) => "capturing",
            WorkflowState::PreviewReady(_) => "preview ready",
            WorkflowState::Analyzing { .. } => "analyzing",
            WorkflowState::ResultReady { .. } => "showing a result",
            WorkflowState::Error { .. } => "in error",
        }
    }

    pub fn preview(&self) -> Option<&Preview> {
        match self {
            WorkflowState::PreviewReady(preview)
            | WorkflowState::Analyzing { preview, .. }
            | WorkflowState::ResultReady { preview, .. } => Some(preview),
            WorkflowState::Error { preview, .. } => preview.as_ref(),
            WorkflowState::Idle | WorkflowState::Capturing(_) => None,
        }
    }
}

/// Handed out by [`Workflow::begin_analysis`]; its result only lands if the
/// workflow has not moved on since.
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    generation: u64,
    image: NormalizedImage,
}

impl AnalysisTicket {
    pub fn image(&self) -> &NormalizedImage {
        &self.image
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Presented(DisplayConfig),
    /// The workflow was reset or restarted while the call was in flight.
    Stale,
}

/// One user's acquire → normalize → classify → present flow.
pub struct Workflow {
    state: WorkflowState,
    generation: u64,
    normalizer: NormalizerSettings,
    facing_mode: FacingMode,
    service: ClassificationService,
}

impl Workflow {
    pub fn new(settings: &Settings, service: ClassificationService) -> Self {
        Self {
            state: WorkflowState::Idle,
            generation: 0,
            normalizer: settings.normalizer,
            facing_mode: settings.camera.facing_mode,
            service,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self.state, WorkflowState::Analyzing { .. })
    }

    pub fn error(&self) -> Option<&ErrorReport> {
        match &self.state {
            WorkflowState::Error { report, .. } => Some(report),
            _ => None,
        }
    }

    pub fn service(&self) -> ClassificationService {
        self.service.clone()
    }

    fn reject_while_analyzing(&self, action: &'static str) -> Result<(), AppError> {
        if self.is_analyzing() {
            return Err(AppError::InvalidTransition {
                action,
                state: self.state_name(),
            });
        }
        Ok(())
    }

    fn fail(&mut self, error: &AppError, preview: Option<Preview>) {
        error!("Workflow failed while {}: {}", self.state_name(), error);
        self.state = WorkflowState::Error {
            report: ErrorReport::from(error),
            preview,
        };
    }

    fn transition(&mut self, next: WorkflowState) {
        debug!("Workflow {} -> {}", self.state_name(), next.name());
        self.state = next;
    }

    async fn prepare_preview(&self, blob: ImageBlob) -> Result<Preview, AppError> {
        let normalized = normalize_async(blob.shared_bytes(), self.normalizer).await?;
        Ok(Preview { blob, normalized })
    }

    async fn accept_blob(&mut self, blob: Result<ImageBlob, AppError>) -> Result<&Preview, AppError> {
        let preview = match blob {
            Ok(blob) => self.prepare_preview(blob).await,
            Err(e) => Err(e),
        };
        match preview {
            Ok(preview) => {
                info!(
                    "Preview ready from {} ({}x{})",
                    preview.blob.source(),
                    preview.normalized.width(),
                    preview.normalized.height()
                );
                self.transition(WorkflowState::PreviewReady(preview));
                self.state.preview().ok_or(AppError::InvalidTransition {
                    action: "show a preview",
                    state: self.state.name(),
                })
            }
            Err(e) => {
                self.fail(&e, None);
                Err(e)
            }
        }
    }

    /// Accepts a picked file. Leaving the camera view releases its stream.
    #[instrument(skip(self, file), fields(name = %file.name))]
    pub async fn select_file(&mut self, file: SelectedFile) -> Result<&Preview, AppError> {
        self.reject_while_analyzing("select a file")?;
        self.transition(WorkflowState::Idle);
        let blob = select_file(file);
        self.accept_blob(blob).await
    }

    pub async fn start_camera(&mut self, device: &dyn CameraDevice) -> Result<(), AppError> {
        self.reject_while_analyzing("start the camera")?;
        self.transition(WorkflowState::Idle);
        match CameraSession::start(device, self.facing_mode).await {
            Ok(session) => {
                self.transition(WorkflowState::Capturing(session));
                Ok(())
            }
            Err(e) => {
                self.fail(&e, None);
                Err(e)
            }
        }
    }

    pub async fn capture(&mut self) -> Result<&Preview, AppError> {
        let session = match mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::Capturing(session) => session,
            other => {
                let state = other.name();
                self.state = other;
                return Err(AppError::InvalidTransition {
                    action: "capture",
                    state,
                });
            }
        };
        let blob = session.capture();
        self.accept_blob(blob).await
    }

    pub fn cancel_camera(&mut self) -> Result<(), AppError> {
        match &self.state {
            WorkflowState::Capturing(_) => {
                info!("Camera cancelled");
                self.transition(WorkflowState::Idle);
                Ok(())
            }
            other => Err(AppError::InvalidTransition {
                action: "cancel the camera",
                state: other.name(),
            }),
        }
    }

    /// Moves to Analyzing. Rejected while another analysis is pending.
    pub fn begin_analysis(&mut self) -> Result<AnalysisTicket, AppError> {
        let preview = match mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::PreviewReady(preview)
            | WorkflowState::ResultReady { preview, .. }
            | WorkflowState::Error {
                preview: Some(preview),
                ..
            } => preview,
            other => {
                let rejection = match other {
                    WorkflowState::Analyzing { .. } => AppError::AnalysisInProgress,
                    _ => AppError::InvalidTransition {
                        action: "analyze",
                        state: other.name(),
                    },
                };
                self.state = other;
                return Err(rejection);
            }
        };

        self.generation += 1;
        let ticket = AnalysisTicket {
            generation: self.generation,
            image: preview.normalized.clone(),
        };
        self.transition(WorkflowState::Analyzing {
            preview,
            generation: self.generation,
        });
        Ok(ticket)
    }

    /// Applies the outcome of a classification call unless it is stale.
    pub fn complete_analysis(
        &mut self,
        ticket: AnalysisTicket,
        outcome: Result<ClassificationResult, AppError>,
    ) -> Result<Completion, AppError> {
        let preview = match mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::Analyzing {
                preview,
                generation,
            } if generation == ticket.generation => preview,
            other => {
                self.state = other;
                debug!(
                    "Ignoring stale classification outcome (ticket {}, current {})",
                    ticket.generation, self.generation
                );
                return Ok(Completion::Stale);
            }
        };
        match outcome {
            Ok(result) => {
                let card = present(&result);
                info!(
                    "Result: #{} {} ({})",
                    card.number, card.label, card.confidence
                );
                self.transition(WorkflowState::ResultReady {
                    preview,
                    result,
                    display: card.clone(),
                });
                Ok(Completion::Presented(card))
            }
            Err(e) => {
                self.fail(&e, Some(preview));
                Err(e)
            }
        }
    }

    /// Begins, runs and completes one classification.
    pub async fn analyze(&mut self) -> Result<DisplayConfig, AppError> {
        let ticket = self.begin_analysis()?;
        let outcome = self.service.clone().oneshot(ticket.image.clone()).await;
        match self.complete_analysis(ticket, outcome)? {
            Completion::Presented(display) => Ok(display),
            Completion::Stale => Err(AppError::InvalidTransition {
                action: "present a result",
                state: self.state_name(),
            }),
        }
    }

    /// Back to Idle; drops every derived artifact and releases the camera.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.transition(WorkflowState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::MediaStream;
    use crate::pipeline::classifier::Classifier;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([200, 200, 200])));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn bottle() -> ClassificationResult {
        ClassificationResult {
            waste_type: "Recyclable Waste".to_string(),
            confidence: 0.97,
            reasoning: "plastic bottle".to_string(),
            disposal_method: "Recycling at a municipal facility".to_string(),
        }
    }

    enum Behaviour {
        Succeed,
        RejectKey,
        WaitFor(Arc<Notify>),
    }

    struct ScriptedClassifier {
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Classifier for ScriptedClassifier {
        async fn classify(
            &self,
            _image: &NormalizedImage,
        ) -> Result<ClassificationResult, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Succeed => Ok(bottle()),
                Behaviour::RejectKey => Err(AppError::Auth("API key not valid".to_string())),
                Behaviour::WaitFor(notify) => {
                    notify.notified().await;
                    Ok(bottle())
                }
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn workflow(behaviour: Behaviour) -> (Workflow, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = ClassificationService::new(Box::new(ScriptedClassifier {
            behaviour,
            calls: calls.clone(),
        }));
        (Workflow::new(&Settings::default(), service), calls)
    }

    fn upload(width: u32, height: u32) -> SelectedFile {
        SelectedFile::new("item.png", "image/png", png(width, height))
    }

    struct TrackedStream {
        live: Arc<AtomicUsize>,
        active: bool,
    }

    impl MediaStream for TrackedStream {
        fn grab_frame(&mut self) -> Result<DynamicImage, AppError> {
            Ok(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
                1280,
                720,
                Rgb([0, 0, 0]),
            )))
        }

        fn stop(&mut self) {
            if self.active {
                self.active = false;
                self.live.fetch_sub(1, Ordering::SeqCst);
            }
        }

        fn is_active(&self) -> bool {
            self.active
        }
    }

    struct TrackedCamera {
        live: Arc<AtomicUsize>,
        denied: bool,
    }

    #[async_trait]
    impl CameraDevice for TrackedCamera {
        async fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>, AppError> {
            assert_eq!(facing, FacingMode::Environment);
            if self.denied {
                return Err(AppError::DeviceAccess("permission denied".to_string()));
            }
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(TrackedStream {
                live: self.live.clone(),
                active: true,
            }))
        }
    }

    fn tracked_camera(denied: bool) -> (TrackedCamera, Arc<AtomicUsize>) {
        let live = Arc::new(AtomicUsize::new(0));
        (
            TrackedCamera {
                live: live.clone(),
                denied,
            },
            live,
        )
    }

    #[tokio::test]
    async fn upload_then_analyze_presents_result() {
        let (mut workflow, calls) = workflow(Behaviour::Succeed);
        let preview = workflow.select_file(upload(2000, 1000)).await.unwrap();
        assert_eq!(preview.normalized.dimensions(), (512, 256));
        assert_eq!(workflow.state_name(), "preview ready");

        let display = workflow.analyze().await.unwrap();
        assert_eq!(display.number, 2);
        assert_eq!(display.label, "Recyclable Waste");
        assert_eq!(display.confidence, "97.0%");
        assert!(matches!(workflow.state(), WorkflowState::ResultReady { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn returned_preview_and_card_match_held_state() {
        let (mut workflow, _) = workflow(Behaviour::Succeed);
        let id = workflow.select_file(upload(640, 480)).await.unwrap().blob.id();
        assert_eq!(workflow.state().preview().unwrap().blob.id(), id);

        let card = workflow.analyze().await.unwrap();
        match workflow.state() {
            WorkflowState::ResultReady { preview, display, .. } => {
                assert_eq!(preview.blob.id(), id);
                assert_eq!(display, &card);
            }
            other => panic!("unexpected state {:?}", other.name()),
        }
    }

    #[tokio::test]
    async fn non_image_upload_moves_to_error() {
        let (mut workflow, _) = workflow(Behaviour::Succeed);
        let result = workflow
            .select_file(SelectedFile::new("notes.txt", "text/plain", b"hi".to_vec()))
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(workflow.error().unwrap().kind, ErrorKind::InvalidInput);

        workflow.reset();
        assert!(matches!(workflow.state(), WorkflowState::Idle));
    }

    #[tokio::test]
    async fn corrupt_image_is_decode_error() {
        let (mut workflow, _) = workflow(Behaviour::Succeed);
        let result = workflow
            .select_file(SelectedFile::new("broken.png", "image/png", vec![0x89, 0x50, 0x4e]))
            .await;
        assert!(matches!(result, Err(AppError::Decode(_))));
        assert_eq!(workflow.error().unwrap().kind, ErrorKind::Decode);
    }

    #[tokio::test]
    async fn analyze_without_image_is_rejected_in_place() {
        let (mut workflow, calls) = workflow(Behaviour::Succeed);
        assert!(matches!(
            workflow.analyze().await,
            Err(AppError::InvalidTransition { .. })
        ));
        assert!(matches!(workflow.state(), WorkflowState::Idle));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_analysis_is_rejected_while_pending() {
        let notify = Arc::new(Notify::new());
        let (mut workflow, calls) = workflow(Behaviour::WaitFor(notify.clone()));
        workflow.select_file(upload(64, 64)).await.unwrap();

        let ticket = workflow.begin_analysis().unwrap();
        let pending = tokio::spawn(workflow.service().oneshot(ticket.image().clone()));

        assert!(matches!(
            workflow.begin_analysis(),
            Err(AppError::AnalysisInProgress)
        ));
        assert!(workflow.is_analyzing());
        assert!(matches!(
            workflow.select_file(upload(8, 8)).await,
            Err(AppError::InvalidTransition { .. })
        ));
        assert!(workflow.is_analyzing());

        notify.notify_one();
        let outcome = pending.await.unwrap();
        let completion = workflow.complete_analysis(ticket, outcome).unwrap();
        assert!(matches!(completion, Completion::Presented(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Re-analysis is allowed once the first call resolved.
        assert!(workflow.begin_analysis().is_ok());
    }

    #[tokio::test]
    async fn stale_result_after_reset_is_ignored() {
        let notify = Arc::new(Notify::new());
        let (mut workflow, _) = workflow(Behaviour::WaitFor(notify.clone()));
        workflow.select_file(upload(64, 64)).await.unwrap();

        let ticket = workflow.begin_analysis().unwrap();
        let pending = tokio::spawn(workflow.service().oneshot(ticket.image().clone()));
        workflow.reset();

        notify.notify_one();
        let outcome = pending.await.unwrap();
        assert_eq!(
            workflow.complete_analysis(ticket, outcome).unwrap(),
            Completion::Stale
        );
        assert!(matches!(workflow.state(), WorkflowState::Idle));
    }

    #[tokio::test]
    async fn stale_result_does_not_land_on_newer_analysis() {
        let (mut workflow, _) = workflow(Behaviour::Succeed);
        workflow.select_file(upload(64, 64)).await.unwrap();
        let old = workflow.begin_analysis().unwrap();
        workflow.reset();

        workflow.select_file(upload(32, 32)).await.unwrap();
        let current = workflow.begin_analysis().unwrap();
        assert!(current.generation() > old.generation());

        assert_eq!(
            workflow.complete_analysis(old, Ok(bottle())).unwrap(),
            Completion::Stale
        );
        assert!(workflow.is_analyzing());
        assert!(matches!(
            workflow.complete_analysis(current, Ok(bottle())).unwrap(),
            Completion::Presented(_)
        ));
    }

    #[tokio::test]
    async fn auth_rejection_surfaces_as_auth_and_allows_retry() {
        let (mut workflow, calls) = workflow(Behaviour::RejectKey);
        workflow.select_file(upload(64, 64)).await.unwrap();
        assert!(matches!(workflow.analyze().await, Err(AppError::Auth(_))));
        assert_eq!(workflow.error().unwrap().kind, ErrorKind::Auth);
        assert!(workflow.state().preview().is_some());

        assert!(matches!(workflow.analyze().await, Err(AppError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn camera_cancel_releases_stream() {
        let (mut workflow, _) = workflow(Behaviour::Succeed);
        let (camera, live) = tracked_camera(false);
        workflow.start_camera(&camera).await.unwrap();
        assert_eq!(live.load(Ordering::SeqCst), 1);
        workflow.cancel_camera().unwrap();
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert!(matches!(workflow.state(), WorkflowState::Idle));
    }

    #[tokio::test]
    async fn camera_capture_releases_stream_and_previews() {
        let (mut workflow, _) = workflow(Behaviour::Succeed);
        let (camera, live) = tracked_camera(false);
        workflow.start_camera(&camera).await.unwrap();
        let preview = workflow.capture().await.unwrap();
        assert_eq!(preview.normalized.dimensions(), (512, 288));
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn switching_to_upload_or_reset_releases_stream() {
        let (mut workflow, _) = workflow(Behaviour::Succeed);
        let (camera, live) = tracked_camera(false);

        workflow.start_camera(&camera).await.unwrap();
        workflow.select_file(upload(16, 16)).await.unwrap();
        assert_eq!(live.load(Ordering::SeqCst), 0);

        workflow.start_camera(&camera).await.unwrap();
        workflow.reset();
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn denied_camera_is_device_error() {
        let (mut workflow, _) = workflow(Behaviour::Succeed);
        let (camera, _) = tracked_camera(true);
        assert!(matches!(
            workflow.start_camera(&camera).await,
            Err(AppError::DeviceAccess(_))
        ));
        assert_eq!(workflow.error().unwrap().kind, ErrorKind::DeviceAccess);
        assert!(matches!(
            workflow.capture().await,
            Err(AppError::InvalidTransition { .. })
        ));
    }
}

pub mod backend;
pub mod camera;
pub mod recorder;

pub use backend::{
    select_mime_type, PassthroughRecorder, RecorderBackend, RecorderSettings, MIME_PREFERENCE,
};
pub use camera::{CameraController, TestPatternCamera, VideoFrame, VideoSource};
pub use recorder::{AvRecorder, RecordingArtifact, RecordingSettings};

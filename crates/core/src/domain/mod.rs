pub mod progress;
pub mod task;

pub use progress::{ProgressEvent, ProgressSink, RecordingProgressSink};
pub use task::{Category, CreatedTask, Priority, TaskRecord};

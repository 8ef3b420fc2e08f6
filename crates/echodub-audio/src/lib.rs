pub mod decode;
pub mod output;
pub mod route;
pub mod scheduler;
pub mod signature;
pub mod timeline;

pub use output::{find_output_device, OutputHandle, OutputNode, OutputStatus};
pub use route::RouteGain;
pub use scheduler::{AudioScheduler, SchedulerSettings, TapHandle};
pub use signature::{chunk_signature, DedupWindow};
pub use timeline::{PlaybackTimeline, ScheduledSlot};

use ringbuf::traits::Split;
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Create a ring buffer split into producer and consumer halves.
pub fn create_ring_buffer(capacity: usize) -> (HeapProd<f32>, HeapCons<f32>) {
    HeapRb::<f32>::new(capacity).split()
}

use {courier_config::QueueConfig, tracing::info};

use crate::{
    delay::DelayPolicy,
    queue::{DispatchQueue, QueueKind},
};

/// The three category queues of one messaging client.
///
/// Queues never share a worker: a video and a text send may finish in
/// either order, two text sends never do.
#[derive(Clone)]
pub struct Dispatcher {
    text: DispatchQueue,
    video: DispatchQueue,
    image: DispatchQueue,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            text: DispatchQueue::with_default_delay(QueueKind::Text),
            video: DispatchQueue::with_default_delay(QueueKind::Video),
            image: DispatchQueue::with_default_delay(QueueKind::Image),
        }
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            text: DispatchQueue::new(QueueKind::Text, DelayPolicy::fixed_ms(config.text_delay_ms)),
            video: DispatchQueue::new(
                QueueKind::Video,
                DelayPolicy::fixed_ms(config.video_delay_ms),
            ),
            image: DispatchQueue::new(
                QueueKind::Image,
                DelayPolicy::uniform_ms(config.image_delay_min_ms, config.image_delay_max_ms),
            ),
        }
    }

    #[must_use]
    pub fn text(&self) -> &DispatchQueue {
        &self.text
    }

    #[must_use]
    pub fn video(&self) -> &DispatchQueue {
        &self.video
    }

    #[must_use]
    pub fn image(&self) -> &DispatchQueue {
        &self.image
    }

    #[must_use]
    pub fn queue(&self, kind: QueueKind) -> &DispatchQueue {
        match kind {
            QueueKind::Text => &self.text,
            QueueKind::Video => &self.video,
            QueueKind::Image => &self.image,
        }
    }

    /// Drain every queue (text, video, image) and stop their workers.
    pub async fn drain_and_stop(&self) {
        for kind in QueueKind::ALL {
            let queue = self.queue(kind);
            let pending = queue.pending();
            if pending > 0 {
                info!(queue = %kind, pending, "waiting for queued sends to finish");
            }
            queue.drain_and_stop().await;
        }
    }
}

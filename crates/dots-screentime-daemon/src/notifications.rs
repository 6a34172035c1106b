use std::collections::VecDeque;
use std::sync::Arc;

use dots_screentime_common::{Notification, NotificationKind};
use notify_rust::{Notification as SystemNotification, Timeout, Urgency};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Bounded mailbox of user-facing messages.
///
/// The presentation layer drains it through `GetNotifications`. When full,
/// the oldest message is dropped to make room. Desktop delivery is an
/// optional side channel and never affects what stays queued.
#[derive(Clone)]
pub struct NotificationQueue {
    inner: Arc<Mutex<VecDeque<Notification>>>,
    capacity: usize,
    desktop: Option<mpsc::UnboundedSender<Notification>>,
}

impl NotificationQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
            desktop: None,
        }
    }

    /// Also show every pushed message as a desktop notification.
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_desktop_delivery(mut self) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Notification>();

        tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                let title = notification.title.clone();
                match tokio::task::spawn_blocking(move || show_desktop(&notification)).await {
                    Ok(Ok(())) => debug!("Desktop notification sent: {}", title),
                    Ok(Err(e)) => warn!("Failed to send desktop notification: {}", e),
                    Err(e) => warn!("Desktop notification task failed: {}", e),
                }
            }
        });

        self.desktop = Some(sender);
        self
    }

    pub fn push(&self, notification: Notification) {
        info!("Notification: {} - {}", notification.title, notification.message);

        if let Some(sender) = &self.desktop {
            if sender.send(notification.clone()).is_err() {
                warn!("Desktop notification channel closed");
            }
        }

        let mut queue = self.inner.lock();
        while queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(notification);
    }

    /// Take every pending message, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        self.inner.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

fn show_desktop(notification: &Notification) -> Result<(), notify_rust::error::Error> {
    let (urgency, timeout, icon) = match notification.kind {
        NotificationKind::Info => (Urgency::Normal, Timeout::Milliseconds(8000), "dialog-information"),
        NotificationKind::Warning => (Urgency::Normal, Timeout::Milliseconds(15000), "appointment-soon"),
        NotificationKind::Error => (Urgency::Critical, Timeout::Never, "dialog-error"),
    };

    SystemNotification::new()
        .appname("DOTS Screen Time")
        .summary(&notification.title)
        .body(&notification.message)
        .icon(icon)
        .urgency(urgency)
        .timeout(timeout)
        .show()?;

    Ok(())
}

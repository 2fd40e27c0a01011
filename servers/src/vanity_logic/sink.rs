use lib_vanity::core::notify::{LogSink, NotificationEvent, NotificationSink};
use lib_vanity::error::NotifyError;
use lib_vanity::remote::channel::RestChannelSink;

/// Notification sink picked at startup.
pub enum Sink {
    Rest(RestChannelSink),
    Log(LogSink),
}

impl NotificationSink for Sink {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        match self {
            Sink::Rest(sink) => sink.deliver(event).await,
            Sink::Log(sink) => sink.deliver(event).await,
        }
    }
}

use std::sync::mpsc::Sender;

/// Receives progress notifications from extraction and conversion.
///
/// Called synchronously from the conversion call stack; implementations
/// must not block.
pub trait ProgressSink {
    fn report(&self, percent: u8, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(u8, &str),
{
    fn report(&self, percent: u8, message: &str) {
        self(percent.min(100), message)
    }
}

/// Sink that discards every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8, _message: &str) {}
}

/// A progress notification, for sinks that forward to another thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub percent: u8,
    pub message: String,
}

/// Forwards notifications over a channel, e.g. from a worker thread to a UI thread
#[derive(Debug, Clone)]
pub struct ChannelProgress(pub Sender<ProgressEvent>);

impl ProgressSink for ChannelProgress {
    fn report(&self, percent: u8, message: &str) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.0.send(ProgressEvent {
            percent: percent.min(100),
            message: message.to_string(),
        });
    }
}

/// Percentage for `index` of `total` mapped linearly onto `start..start + span`
pub(crate) fn interpolate(start: u8, span: u8, index: usize, total: usize) -> u8 {
    if total == 0 {
        return start;
    }
    let offset = (index.min(total) * span as usize) / total;
    (start as usize + offset).min(100) as u8
}

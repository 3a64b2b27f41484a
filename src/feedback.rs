// src/feedback.rs

//! Hand-off of classifications to an optional tutoring-feedback generator.
//!
//! The attempt pipeline publishes a [`FeedbackEvent`] and moves on. A
//! [`FeedbackWorker`] running wherever the host puts it drains the queue and
//! calls the injected [`FeedbackGenerator`]. When no generator is available the
//! [`FallbackGenerator`] still produces usable text from the classification.

use crate::error::{CoreError, CoreResult};
use crate::models::{Category, Classification};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, warn};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackEvent {
    pub user_id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub classification: Classification,
}

/// Non-blocking, infallible from the caller's point of view.
pub trait FeedbackPublisher: Send + Sync {
    fn publish(&self, event: FeedbackEvent);
}

/// For environments without a feedback generator.
pub struct NoopPublisher;

impl FeedbackPublisher for NoopPublisher {
    fn publish(&self, event: FeedbackEvent) {
        debug!(
            "[Feedback] No publisher configured, dropping event for attempt {}",
            event.attempt_id
        );
    }
}

pub struct ChannelPublisher {
    tx: Sender<FeedbackEvent>,
}

impl ChannelPublisher {
    pub fn new(tx: Sender<FeedbackEvent>) -> Self {
        Self { tx }
    }
}

impl FeedbackPublisher for ChannelPublisher {
    fn publish(&self, event: FeedbackEvent) {
        let attempt_id = event.attempt_id;
        match self.tx.try_send(event) {
            Ok(()) => debug!("[Feedback] Queued attempt {}", attempt_id),
            Err(TrySendError::Full(_)) => {
                warn!("[Feedback] Queue full, dropping attempt {}", attempt_id)
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("[Feedback] Worker gone, dropping attempt {}", attempt_id)
            }
        }
    }
}

/// Bounded queue shared by a [`ChannelPublisher`] and a [`FeedbackWorker`].
pub fn feedback_queue(capacity: usize) -> (ChannelPublisher, Receiver<FeedbackEvent>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (ChannelPublisher::new(tx), rx)
}

pub trait FeedbackGenerator: Send {
    fn generate(&self, event: &FeedbackEvent) -> CoreResult<String>;
}

/// Deterministic text built from the classification alone.
pub struct FallbackGenerator;

impl FeedbackGenerator for FallbackGenerator {
    fn generate(&self, event: &FeedbackEvent) -> CoreResult<String> {
        Ok(fallback_text(&event.classification))
    }
}

pub fn fallback_text(c: &Classification) -> String {
    let headline = match c.category {
        Category::Syntax => "Your code did not compile.",
        Category::Logic => "The program runs but produces wrong answers.",
        Category::EdgeCase => "Most cases work; a boundary case slips through.",
        Category::Timeout => "The program ran out of time.",
        Category::OutputFormat => "The answer is right but the output format is not.",
        Category::NullHandling => "Something was null when the code expected a value.",
        Category::OffByOne => "The result is off by exactly one.",
        Category::TypeError => "A value had the wrong type or format.",
        Category::RuntimeError => "The program crashed while running.",
        Category::Other => "Take another look at the problem statement.",
    };
    let mut text = format!("{} Focus: {}", headline, c.suggested_focus);
    if let Some(first) = c.signals.first() {
        text.push_str(&format!(" (noticed: {})", first));
    }
    text
}

pub struct FeedbackWorker<G: FeedbackGenerator> {
    rx: Receiver<FeedbackEvent>,
    generator: G,
}

impl<G: FeedbackGenerator> FeedbackWorker<G> {
    pub fn new(rx: Receiver<FeedbackEvent>, generator: G) -> Self {
        Self { rx, generator }
    }

    /// Blocks until every publisher is dropped.
    pub fn run<F: FnMut(&FeedbackEvent, String)>(&self, mut deliver: F) -> usize {
        let mut handled = 0;
        for event in self.rx.iter() {
            deliver(&event, self.render(&event));
            handled += 1;
        }
        handled
    }

    /// Handles whatever is queued right now without blocking.
    pub fn drain<F: FnMut(&FeedbackEvent, String)>(&self, mut deliver: F) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            deliver(&event, self.render(&event));
            handled += 1;
        }
        handled
    }

    fn render(&self, event: &FeedbackEvent) -> String {
        match self.generator.generate(event) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "[Feedback] Generator failed for attempt {}, using fallback: {}",
                    event.attempt_id, e
                );
                fallback_text(&event.classification)
            }
        }
    }
}

/// A generator that is configured but cannot reach its backend.
pub struct UnavailableGenerator(pub String);

impl FeedbackGenerator for UnavailableGenerator {
    fn generate(&self, _event: &FeedbackEvent) -> CoreResult<String> {
        Err(CoreError::FeedbackUnavailable(self.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestAnalysis;

    fn event(attempt_id: i64) -> FeedbackEvent {
        FeedbackEvent {
            user_id: 1,
            attempt_id,
            question_id: 10,
            classification: Classification {
                category: Category::OffByOne,
                severity: 2,
                signals: vec!["Expected 10 but got 9".to_string()],
                matched_patterns: vec![],
                suggested_focus: "check loop bounds".to_string(),
                test_analysis: TestAnalysis::default(),
            },
        }
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let (publisher, rx) = feedback_queue(1);
        publisher.publish(event(1));
        publisher.publish(event(2));
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn failing_generator_falls_back() {
        let (publisher, rx) = feedback_queue(4);
        publisher.publish(event(1));
        let worker = FeedbackWorker::new(rx, UnavailableGenerator("offline".into()));
        let mut texts = Vec::new();
        let handled = worker.drain(|_, text| texts.push(text));
        assert_eq!(handled, 1);
        assert!(texts[0].contains("off by exactly one"));
    }

    #[test]
    fn run_returns_once_publishers_are_dropped() {
        let (publisher, rx) = feedback_queue(4);
        publisher.publish(event(1));
        publisher.publish(event(2));
        drop(publisher);
        let worker = FeedbackWorker::new(rx, FallbackGenerator);
        assert_eq!(worker.run(|_, _| {}), 2);
    }
}

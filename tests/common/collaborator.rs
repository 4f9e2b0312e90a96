//! Scripted fetch collaborator standing in for yt-dlp

use async_trait::async_trait;
use bulk_dl::fetch::{CollaboratorOutput, FetchCollaborator, FetchTarget, Invocation};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Output used when the collaborator reports a bot challenge
pub const BOT_CHALLENGE_OUTPUT: &str =
    "[youtube] abc: Downloading webpage\nERROR: [youtube] abc: Sign in to confirm you're not a bot. Use --cookies-from-browser\n";

/// Output used for a plain retrieval failure
pub const UNAVAILABLE_OUTPUT: &str = "ERROR: [youtube] abc: Video unavailable\n";

/// A reply rule: targets containing `needle` get `reply`
struct Rule {
    needle: String,
    reply: CollaboratorOutput,
}

/// Collaborator recording every invocation
///
/// Replies with success unless a rule matches the target argument. Tracks the
/// peak number of overlapping invocations.
pub struct MockCollaborator {
    delay: Duration,
    rules: Vec<Rule>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    invocations: Mutex<Vec<Invocation>>,
}

impl MockCollaborator {
    /// Collaborator answering every invocation with success
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            rules: Vec::new(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Hold every invocation for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Reply `reply` to targets containing `needle`
    pub fn reply_to(mut self, needle: &str, reply: CollaboratorOutput) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            reply,
        });
        self
    }

    /// Every invocation received so far
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Target arguments received so far, sorted
    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<_> = self
            .invocations()
            .iter()
            .map(Invocation::target_arg)
            .collect();
        targets.sort();
        targets
    }

    /// Highest number of invocations that ran at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchCollaborator for MockCollaborator {
    async fn run(&self, invocation: &Invocation) -> bulk_dl::Result<CollaboratorOutput> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.invocations.lock().unwrap().push(invocation.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let target = match &invocation.target {
            FetchTarget::Search { expression } => expression.clone(),
            FetchTarget::Url(url) => url.to_string(),
        };
        let reply = self
            .rules
            .iter()
            .find(|rule| target.contains(&rule.needle))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| CollaboratorOutput::success("[download] 100% of 3.2MiB\n"));
        Ok(reply)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

//! Orchestrator: runs the detectors across every reachable frame, applies
//! the filtering policy, fans solve requests out to the provider, and drives
//! injection. Written once against the [`Detector`]/[`Injector`] traits;
//! adding a vendor never touches this module.

use crate::challenge::{
    ChallengePayload, ChallengeRecord, EnterResult, FilterDecision, FilterReason, FindResult,
    IdGenerator, RunResult, Solution, SolveResult, SolvedRecord, VendorTag,
};
use crate::detect::{Detector, all_detectors};
use crate::inject::{DOC_FOR_JS, InjectOptions, Injector, all_injectors};
use crate::page::script::{PageHandle, debug_to_page};
use crate::provider::{Provider, SolveRequest};
use futures::future::join_all;
use std::time::SystemTime;

/// Orchestration flags, defaults matching the conservative policy: only
/// visible, active checkbox-style widgets are solved unless explicitly
/// widened.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Draw a colored border on processed elements
    pub visual_feedback: bool,

    /// Drop challenges that are not fully inside the viewport
    pub solve_in_viewport_only: bool,

    /// Solve score-based (v3/programmatic) challenges
    pub solve_score_based: bool,

    /// Solve widgets that are already solved or have no active challenge
    pub solve_inactive_challenges: bool,

    /// Solve generic image captchas
    pub solve_image_captchas: bool,

    /// Name of a host-provided page-side logging bridge
    pub debug_sink: Option<String>,

    /// Delay before clicking a discovered submit control
    pub submit_delay_ms: u64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            visual_feedback: true,
            solve_in_viewport_only: false,
            solve_score_based: false,
            solve_inactive_challenges: false,
            solve_image_captchas: false,
            debug_sink: None,
            submit_delay_ms: 500,
        }
    }
}

impl SolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visual_feedback(mut self, enabled: bool) -> Self {
        self.visual_feedback = enabled;
        self
    }

    pub fn solve_in_viewport_only(mut self, enabled: bool) -> Self {
        self.solve_in_viewport_only = enabled;
        self
    }

    pub fn solve_score_based(mut self, enabled: bool) -> Self {
        self.solve_score_based = enabled;
        self
    }

    pub fn solve_inactive_challenges(mut self, enabled: bool) -> Self {
        self.solve_inactive_challenges = enabled;
        self
    }

    pub fn solve_image_captchas(mut self, enabled: bool) -> Self {
        self.solve_image_captchas = enabled;
        self
    }

    pub fn debug_sink(mut self, name: impl Into<String>) -> Self {
        self.debug_sink = Some(name.into());
        self
    }

    pub fn submit_delay_ms(mut self, ms: u64) -> Self {
        self.submit_delay_ms = ms;
        self
    }
}

/// End-to-end captcha engine for one page
pub struct CaptchaSolver {
    opts: SolverOptions,
}

impl CaptchaSolver {
    pub fn new(opts: SolverOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &SolverOptions {
        &self.opts
    }

    /// Detect challenges across the page and every reachable sub-document,
    /// then apply the filtering policy. Dropped challenges are recorded with
    /// their reason, never silently discarded.
    pub fn find(&self, page: &dyn PageHandle) -> FindResult {
        let snapshot = match page.snapshot() {
            Ok(s) => s,
            Err(e) => return FindResult { error: Some(e.to_string()), ..Default::default() },
        };

        let detectors = all_detectors();
        let mut ids = IdGenerator::new();
        let mut challenges = Vec::new();
        let mut error: Option<String> = None;

        // Frame isolation: one failing frame never blocks the others
        for frame in &snapshot.frames {
            for detector in &detectors {
                match detector.detect(frame, &mut ids) {
                    Ok(found) => challenges.extend(found),
                    Err(e) => {
                        log::warn!("{} detection failed in {}: {}", detector.name(), frame.url, e);
                        error.get_or_insert(e.to_string());
                    }
                }
            }
        }

        dedup_images(&mut challenges);
        let (challenges, filtered) = self.apply_filters(challenges);

        if self.opts.visual_feedback {
            self.mark_detected(page, &challenges);
        }
        debug_to_page(
            page,
            self.opts.debug_sink.as_deref(),
            &format!("find: {} challenges, {} filtered", challenges.len(), filtered.len()),
        );

        FindResult { challenges, filtered, error }
    }

    /// Request one solution per challenge, all in flight together. One
    /// failure never cancels the rest; output order matches input order and
    /// the aggregate error is the first per-challenge error encountered.
    pub async fn solve(
        &self,
        challenges: &[ChallengeRecord],
        provider: &dyn Provider,
    ) -> SolveResult {
        let solutions = join_all(challenges.iter().map(|c| solve_one(c, provider))).await;
        let error = solutions.iter().find_map(|s| s.error.clone());
        SolveResult { solutions, error }
    }

    /// Write solutions back into the page. Injector failures land in each
    /// record's `error`; the pass always processes every solution.
    pub fn enter(&self, page: &dyn PageHandle, solutions: &[Solution]) -> EnterResult {
        let snapshot = match page.snapshot() {
            Ok(s) => s,
            Err(e) => return EnterResult { error: Some(e.to_string()), ..Default::default() },
        };

        let injectors = all_injectors();
        let inject_opts = InjectOptions {
            visual_feedback: self.opts.visual_feedback,
            submit_delay_ms: self.opts.submit_delay_ms,
            debug_sink: self.opts.debug_sink.clone(),
        };

        let mut solved = Vec::with_capacity(solutions.len());
        for solution in solutions {
            let record = match injectors.iter().find(|i| i.handles(solution.vendor)) {
                Some(injector) => injector.inject(page, &snapshot, solution, &inject_opts),
                None => SolvedRecord::failure(
                    &solution.id,
                    solution.vendor,
                    format!("no injector registered for {}", solution.vendor),
                ),
            };
            if let Some(err) = &record.error {
                log::warn!("injection failed for {}: {}", record.id, err);
            }
            solved.push(record);
        }

        EnterResult { solved, error: None }
    }

    /// Full cycle: find, solve, enter. When find yields zero survivors the
    /// later stages are skipped and come back empty with no error.
    pub async fn run(&self, page: &dyn PageHandle, provider: &dyn Provider) -> RunResult {
        let found = self.find(page);
        if found.challenges.is_empty() {
            return RunResult {
                challenges: found.challenges,
                filtered: found.filtered,
                error: found.error,
                ..Default::default()
            };
        }

        let solved_result = self.solve(&found.challenges, provider).await;
        let entered = self.enter(page, &solved_result.solutions);

        RunResult {
            error: found
                .error
                .or(solved_result.error.clone())
                .or(entered.error.clone()),
            challenges: found.challenges,
            filtered: found.filtered,
            solutions: solved_result.solutions,
            solved: entered.solved,
        }
    }

    /// Filtering policy, applied in order: viewport, score-based, inactive,
    /// image
    fn apply_filters(
        &self,
        challenges: Vec<ChallengeRecord>,
    ) -> (Vec<ChallengeRecord>, Vec<FilterDecision>) {
        let mut kept = Vec::new();
        let mut filtered = Vec::new();

        for challenge in challenges {
            let reason = self.filter_reason(&challenge);
            match reason {
                Some(reason) => filtered.push(FilterDecision {
                    challenge_id: challenge.id.clone(),
                    vendor: challenge.vendor,
                    reason,
                }),
                None => kept.push(challenge),
            }
        }
        (kept, filtered)
    }

    fn filter_reason(&self, challenge: &ChallengeRecord) -> Option<FilterReason> {
        if self.opts.solve_in_viewport_only && !challenge.in_viewport {
            return Some(FilterReason::ViewportOnly);
        }
        if challenge.vendor == VendorTag::RecaptchaScore && !self.opts.solve_score_based {
            return Some(FilterReason::ScoreBasedDisabled);
        }
        if !self.opts.solve_inactive_challenges {
            if let Some(widget) = challenge.widget() {
                let inactive = widget.is_solved
                    || (widget.is_invisible
                        && challenge.vendor != VendorTag::RecaptchaScore
                        && !widget.has_active_overlay);
                if inactive {
                    return Some(FilterReason::InactiveChallengeDisabled);
                }
            }
        }
        if challenge.vendor == VendorTag::Image && !self.opts.solve_image_captchas {
            return Some(FilterReason::ImageDisabled);
        }
        None
    }

    /// Best-effort red border on every surviving challenge element
    fn mark_detected(&self, page: &dyn PageHandle, challenges: &[ChallengeRecord]) {
        for challenge in challenges {
            let Some(descriptor) = &challenge.descriptor else { continue };
            let cfg = serde_json::json!({
                "frameUrl": challenge.frame_url,
                "selector": descriptor.css(),
            });
            let js = format!(
                r#"(function() {{
                    var cfg = {cfg};
                    {doc_for}
                    var el = docFor(cfg.frameUrl).querySelector(cfg.selector);
                    if (el) el.style.border = '3px solid #ff0000';
                    return true;
                }})()"#,
                cfg = cfg,
                doc_for = DOC_FOR_JS,
            );
            if let Err(e) = page.eval(&js) {
                log::debug!("visual feedback failed for {}: {}", challenge.id, e);
            }
        }
    }
}

impl Default for CaptchaSolver {
    fn default() -> Self {
        Self::new(SolverOptions::default())
    }
}

/// Remove duplicate image challenges (same normalized URL) across frames,
/// keeping the first occurrence
fn dedup_images(challenges: &mut Vec<ChallengeRecord>) {
    let mut seen: Vec<String> = Vec::new();
    challenges.retain(|c| match c.image() {
        Some(payload) => {
            if seen.contains(&payload.image_url) {
                false
            } else {
                seen.push(payload.image_url.clone());
                true
            }
        }
        None => true,
    });
}

async fn solve_one(challenge: &ChallengeRecord, provider: &dyn Provider) -> Solution {
    let requested_at = SystemTime::now();
    let (site_key, image_url) = match &challenge.payload {
        ChallengePayload::Widget(w) => (Some(w.site_key.clone()), None),
        ChallengePayload::Image(i) => (None, Some(i.image_url.clone())),
    };

    let mut solution = Solution {
        id: challenge.id.clone(),
        vendor: challenge.vendor,
        provider_id: provider.id().to_string(),
        text: None,
        site_key,
        image_url,
        frame_url: challenge.frame_url.clone(),
        requested_at: Some(requested_at),
        responded_at: None,
        duration_seconds: None,
        error: None,
    };

    let request = build_request(challenge);
    match provider.solve(&request).await {
        Ok(response) => {
            let responded_at = SystemTime::now();
            solution.duration_seconds = responded_at
                .duration_since(requested_at)
                .ok()
                .map(|d| d.as_secs_f64());
            solution.responded_at = Some(responded_at);
            solution.provider_id = response.provider_id;
            solution.text = Some(response.text);
        }
        Err(e) => {
            log::warn!("solve failed for {}: {}", challenge.id, e);
            solution.error = Some(e.to_string());
        }
    }
    solution
}

fn build_request(challenge: &ChallengeRecord) -> SolveRequest {
    match &challenge.payload {
        ChallengePayload::Widget(w) => SolveRequest {
            vendor: challenge.vendor,
            site_key: Some(w.site_key.clone()),
            page_url: Some(w.page_url.clone()),
            image_data: None,
            action: w.action.clone(),
            data_s: w.data_s.clone(),
            is_enterprise: w.is_enterprise,
        },
        ChallengePayload::Image(i) => SolveRequest {
            vendor: challenge.vendor,
            site_key: None,
            page_url: None,
            image_data: i.image_data.clone(),
            action: None,
            data_s: None,
            is_enterprise: false,
        },
    }
}

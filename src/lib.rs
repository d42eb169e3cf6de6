//! # recaptcha-solver
//!
//! A Rust library that finds captchas on arbitrary pages via Chrome DevTools
//! Protocol (CDP), solves them through an external solving service, and
//! injects the solutions back into the page.
//!
//! ## Features
//!
//! - **Detection**: reCAPTCHA checkbox/invisible widgets, score-based (v3)
//!   widgets, hCaptcha widgets, and generic image captchas, across the top
//!   document and every reachable same-origin sub-frame
//! - **Filtering**: policy flags for viewport-only, score-based, inactive,
//!   and image challenges; every dropped challenge is reported with a reason
//! - **Solving**: concurrent fan-out to a solving backend (2captcha built in,
//!   custom backends via the [`Provider`](provider::Provider) trait)
//! - **Injection**: writes tokens into response slots, fires widget
//!   callbacks, fills and submits image-captcha forms
//!
//! ## Usage
//!
//! ```rust,no_run
//! use headless_chrome::Browser;
//! use recaptcha_solver::page::Page;
//! use recaptcha_solver::provider::TwoCaptchaProvider;
//! use recaptcha_solver::solver::{CaptchaSolver, SolverOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let browser = Browser::default()?;
//! let tab = browser.new_tab()?;
//! tab.navigate_to("https://example.com/login")?;
//! tab.wait_until_navigated()?;
//!
//! let page = Page::new(tab);
//! let provider = TwoCaptchaProvider::new("YOUR_API_KEY");
//! let solver = CaptchaSolver::new(SolverOptions::new().solve_image_captchas(true));
//!
//! let result = solver.run(&page, &provider).await;
//! println!(
//!     "{} found, {} filtered, {} solved",
//!     result.challenges.len(),
//!     result.filtered.len(),
//!     result.solved.iter().filter(|s| s.is_solved).count()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! The stages are also callable individually ([`find`](solver::CaptchaSolver::find),
//! [`solve`](solver::CaptchaSolver::solve), [`enter`](solver::CaptchaSolver::enter))
//! when a caller wants to inspect or veto challenges between steps.
//!
//! ## Module Overview
//!
//! - [`solver`]: orchestration (find / solve / enter / run) and policy flags
//! - [`detect`]: per-vendor detectors over a page snapshot
//! - [`inject`]: per-vendor solution injection
//! - [`provider`]: solving-backend contract and the 2captcha client
//! - [`page`]: page snapshot capture and the CDP adapter
//! - [`challenge`]: the data model passed between stages
//! - [`descriptor`]: serializable element addressing across snapshots
//! - [`error`]: error types and result alias

pub mod challenge;
pub mod descriptor;
pub mod detect;
pub mod error;
pub mod inject;
pub mod page;
pub mod provider;
pub mod solver;

pub use challenge::{
    ChallengeRecord, EnterResult, FilterDecision, FilterReason, FindResult, RunResult, Solution,
    SolveResult, SolvedRecord, VendorTag,
};
pub use descriptor::ElementDescriptor;
pub use error::{Result, SolverError};
pub use page::{Page, PageHandle, PageSnapshot};
pub use provider::{Provider, StubProvider, TwoCaptchaProvider};
pub use solver::{CaptchaSolver, SolverOptions};

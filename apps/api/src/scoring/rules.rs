//! Deterministic part of the screening policy.
//!
//! Priority order:
//! 1. fewer than 5 commits                              -> low_effort
//! 2. no commit authored by the repository owner        -> low_effort
//! 3. quiet owner account + small or generic repository -> low_effort
//! 4. >= 10 descriptive commits and > 50 owner events   -> looks_fine (model judges)
//! 5. few commits but >= 100 owner events               -> needs_review, never low_effort
//! 6. everything else                                   -> needs_review (model judges)
//!
//! Rules 1–3 short-circuit before any model call. Rule 5 is re-applied to the
//! model's answer so an active contributor is never auto-rejected.

use crate::github::RepoSignals;
use crate::models::ScreeningStatus;

use super::Verdict;

pub const MIN_COMMITS: usize = 5;
pub const HEALTHY_COMMITS: usize = 10;
pub const LOW_ACTIVITY_EVENTS: u32 = 10;
pub const HIGH_ACTIVITY_EVENTS: u32 = 50;
pub const VERY_HIGH_ACTIVITY_EVENTS: u32 = 100;
/// A README shorter than this (trimmed) counts as generic.
const GENERIC_README_CHARS: usize = 300;

/// Applies rules 1–3. `None` means the model has to decide.
pub fn pre_screen(signals: &RepoSignals) -> Option<Verdict> {
    let commits = signals.commit_count();
    let events = signals.owner_profile.recent_events;

    if commits < MIN_COMMITS {
        return Some(Verdict {
            status: ScreeningStatus::LowEffort,
            signals: vec![
                format!("Only {commits} commit(s) in the repository"),
                format!("Below the minimum of {MIN_COMMITS} commits"),
                format!("README is {} characters long", readme_len(signals)),
            ],
            explanation: format!(
                "The repository has {commits} commit(s), below the minimum of {MIN_COMMITS} for a genuine submission."
            ),
        });
    }

    if let Some(foreign) = foreign_authorship(signals) {
        return Some(Verdict {
            status: ScreeningStatus::LowEffort,
            signals: vec![
                "Commits are not authored by the repository owner".to_string(),
                format!("Commit authors: {foreign}"),
                "Possible non-original submission".to_string(),
            ],
            explanation: format!(
                "None of the linked commit authors match the owner '{}', suggesting copied work.",
                signals.owner_profile.login
            ),
        });
    }

    if events < LOW_ACTIVITY_EVENTS && is_small_or_generic(signals) {
        return Some(Verdict {
            status: ScreeningStatus::LowEffort,
            signals: vec![
                format!("Low owner activity ({events} recent public events)"),
                format!(
                    "Small or generic repository ({commits} commits, README of {} characters)",
                    readme_len(signals)
                ),
                format!("Below {LOW_ACTIVITY_EVENTS} events, the quiet-account threshold"),
            ],
            explanation: "A quiet account combined with a thin repository indicates minimal effort."
                .to_string(),
        });
    }

    None
}

/// Rule 5: an ambiguous but highly active owner is never auto-rejected.
pub fn enforce_priority(signals: &RepoSignals, verdict: Verdict) -> Verdict {
    let ambiguous_but_active = signals.commit_count() < HEALTHY_COMMITS
        && signals.owner_profile.recent_events >= VERY_HIGH_ACTIVITY_EVENTS;

    if ambiguous_but_active && verdict.status == ScreeningStatus::LowEffort {
        let mut signals_out = verdict.signals;
        signals_out.push("Very high owner activity; escalated for manual review".to_string());
        return Verdict {
            status: ScreeningStatus::NeedsReview,
            signals: signals_out,
            explanation: verdict.explanation,
        };
    }
    verdict
}

/// Identity is compared on the stable account id, so display-name and
/// nickname differences never count as a mismatch. Commits without a linked
/// account are ignored, and organisation-owned repositories are exempt.
/// Returns the foreign logins when no linked commit belongs to the owner.
fn foreign_authorship(signals: &RepoSignals) -> Option<String> {
    let owner = &signals.owner_profile;
    if owner.account_type.eq_ignore_ascii_case("organization") {
        return None;
    }
    let owner_id = owner.id?;

    let linked: Vec<_> = signals
        .commits
        .iter()
        .filter_map(|c| c.author_id.map(|id| (id, c.author_login.as_deref())))
        .collect();
    if linked.is_empty() || linked.iter().any(|(id, _)| *id == owner_id) {
        return None;
    }

    let mut logins: Vec<&str> = linked.iter().map(|(_, login)| login.unwrap_or("unknown")).collect();
    logins.sort_unstable();
    logins.dedup();
    Some(logins.join(", "))
}

fn readme_len(signals: &RepoSignals) -> usize {
    signals.readme.trim().chars().count()
}

fn is_small_or_generic(signals: &RepoSignals) -> bool {
    signals.commit_count() < HEALTHY_COMMITS || readme_len(signals) < GENERIC_README_CHARS
}

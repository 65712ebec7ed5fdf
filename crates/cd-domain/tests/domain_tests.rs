//! Escenarios de extremo a extremo de la política de productores + fusión,
//! sin base de datos: cada webhook se convierte en parcial y se fusiona sobre
//! la "fila" acumulada como lo haría el store.

use cd_domain::{merge, PullRequest, PullRequestAction, PullRequestEvent, APPROVED_LABEL};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 3, h, m, 0).unwrap()
}

fn hook(action: PullRequestAction) -> PullRequestEvent {
    PullRequestEvent { owner: "acme".into(),
                       repository: "web".into(),
                       number: 7,
                       author: "erin".into(),
                       state: "open".into(),
                       action,
                       draft: false,
                       merged: false,
                       label: None,
                       reviewer: None,
                       created_at: at(8, 0) }
}

/// Aplica los eventos en orden, como el store: fusión + recálculo.
fn apply(events: Vec<(PullRequestEvent, DateTime<Utc>)>) -> PullRequest {
    let mut row = PullRequest::new("acme", "web", 7);
    for (event, now) in events {
        if let Some(partial) = event.into_partial(now) {
            row = merge(&row, &partial);
            row.calculate_durations();
        }
    }
    row
}

#[test]
fn draft_review_approve_merge() {
    let mut opened = hook(PullRequestAction::Opened);
    opened.draft = true;
    let mut label = hook(PullRequestAction::Labeled);
    label.label = Some(APPROVED_LABEL.into());
    let mut merged = hook(PullRequestAction::Closed);
    merged.merged = true;
    merged.state = "closed".into();

    let row = apply(vec![(opened, at(8, 0)),
                         (hook(PullRequestAction::ReadyForReview), at(9, 0)),
                         (label, at(9, 45)),
                         (merged, at(10, 0))]);

    assert_eq!(row.creation_time, Some(at(8, 0)));
    assert_eq!(row.ready_for_review_time, Some(at(9, 0)));
    assert_eq!(row.approved_time, Some(at(9, 45)));
    assert_eq!(row.merged_time, Some(at(10, 0)));
    assert_eq!(row.time_to_review, Duration::minutes(45));
    assert_eq!(row.time_to_merge, Duration::minutes(15));
    assert_eq!(row.state, "closed");
}

#[test]
fn back_to_draft_clears_ready_time() {
    let row = apply(vec![(hook(PullRequestAction::Opened), at(8, 0)),
                         (hook(PullRequestAction::ConvertedToDraft), at(8, 30))]);
    assert_eq!(row.creation_time, Some(at(8, 0)));
    assert_eq!(row.ready_for_review_time, None);
}

#[test]
fn removing_approval_resets_review_duration() {
    let mut label = hook(PullRequestAction::Labeled);
    label.label = Some(APPROVED_LABEL.into());
    let mut unlabel = hook(PullRequestAction::Unlabeled);
    unlabel.label = Some(APPROVED_LABEL.into());

    let row = apply(vec![(hook(PullRequestAction::Opened), at(8, 0)), (label, at(8, 20)), (unlabel, at(8, 40))]);
    assert_eq!(row.approved_time, None);
    assert_eq!(row.time_to_review, Duration::zero());
}

#[test]
fn out_of_order_reviews_accumulate() {
    let mut bob = hook(PullRequestAction::ReviewSubmitted);
    bob.reviewer = Some("bob".into());
    let mut alice = hook(PullRequestAction::ReviewSubmitted);
    alice.reviewer = Some("alice".into());

    let row = apply(vec![(bob, at(9, 0)), (alice, at(8, 0))]);
    assert_eq!(row.reviews, 2);
    assert_eq!(row.reviewers, vec!["alice", "bob"]);
}


use cd_domain::{PullRequest, PullRequestAction, PullRequestEvent, APPROVED_LABEL};
use cd_persistence::schema::pull_requests;
use cd_persistence::store::PullRequestRow;
use cd_persistence::MergingStore;
use chrono::{DateTime, Duration, TimeZone, Utc};
use diesel::prelude::*;

use test_support::{open_store, provider, unique_owner};

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
}

fn event(owner: &str, action: PullRequestAction) -> PullRequestEvent {
    PullRequestEvent { owner: owner.into(),
                       repository: "api".into(),
                       number: 7,
                       author: "dave".into(),
                       state: "open".into(),
                       action,
                       draft: false,
                       merged: false,
                       label: None,
                       reviewer: None,
                       created_at: at(9, 0) }
}

fn review(owner: &str, reviewer: &str) -> PullRequestEvent {
    let mut e = event(owner, PullRequestAction::ReviewSubmitted);
    e.reviewer = Some(reviewer.into());
    e
}

fn label(owner: &str, action: PullRequestAction) -> PullRequestEvent {
    let mut e = event(owner, action);
    e.label = Some(APPROVED_LABEL.into());
    e
}

fn stored(owner: &str) -> PullRequest {
    let mut conn = provider().expect("provider").pool.get().expect("conn");
    pull_requests::table.filter(pull_requests::owner.eq(owner))
                        .first::<PullRequestRow>(&mut conn)
                        .expect("pull request row")
                        .into()
}

#[test]
fn draft_review_approve_merge_lifecycle() {
    let Some(store) = open_store() else { return };
    let owner = unique_owner();
    let mut opened = event(&owner, PullRequestAction::Opened);
    opened.draft = true;

    let steps = [(opened, at(9, 0)),
                 (event(&owner, PullRequestAction::ReadyForReview), at(10, 0)),
                 (review(&owner, "bob"), at(10, 10)),
                 (review(&owner, "alice"), at(10, 20)),
                 (label(&owner, PullRequestAction::Labeled), at(10, 30)),
                 (event(&owner, PullRequestAction::Merged), at(11, 15))];
    let mut last = None;
    for (e, now) in steps {
        let partial = e.into_partial(now).expect("relevant action");
        last = Some(store.pull_requests.add(&partial).expect("add"));
    }
    let merged = last.expect("at least one add");

    assert_eq!(merged.creation_time, Some(at(9, 0)));
    assert_eq!(merged.ready_for_review_time, Some(at(10, 0)));
    assert_eq!(merged.approved_time, Some(at(10, 30)));
    assert_eq!(merged.merged_time, Some(at(11, 15)));
    assert_eq!(merged.reviews, 2);
    assert_eq!(merged.reviewers, vec!["alice".to_string(), "bob".to_string()]);
    assert_eq!(merged.time_to_review, Duration::minutes(30));
    assert_eq!(merged.time_to_merge, Duration::minutes(45));
    assert_eq!(stored(&owner), merged, "la fila persistida es la devuelta por add");
}

#[test]
fn back_to_draft_clears_ready_time() {
    let Some(store) = open_store() else { return };
    let owner = unique_owner();

    let ready = event(&owner, PullRequestAction::ReadyForReview).into_partial(at(10, 0)).unwrap();
    store.pull_requests.add(&ready).expect("ready");
    let draft = event(&owner, PullRequestAction::ConvertedToDraft).into_partial(at(10, 5)).unwrap();
    let after_draft = store.pull_requests.add(&draft).expect("draft");
    assert_eq!(after_draft.ready_for_review_time, None);

    let ready_again = event(&owner, PullRequestAction::ReadyForReview).into_partial(at(12, 0)).unwrap();
    let after_ready = store.pull_requests.add(&ready_again).expect("ready again");
    assert_eq!(after_ready.ready_for_review_time, Some(at(12, 0)));
    assert_eq!(stored(&owner).ready_for_review_time, Some(at(12, 0)));
}

#[test]
fn removing_approval_clears_approved_time() {
    let Some(store) = open_store() else { return };
    let owner = unique_owner();

    let approve = label(&owner, PullRequestAction::Labeled).into_partial(at(10, 30)).unwrap();
    assert_eq!(store.pull_requests.add(&approve).expect("approve").approved_time, Some(at(10, 30)));
    let unapprove = label(&owner, PullRequestAction::Unlabeled).into_partial(at(10, 40)).unwrap();
    assert_eq!(store.pull_requests.add(&unapprove).expect("unapprove").approved_time, None);
}

#[test]
fn forced_merge_without_review_copies_time_to_merge() {
    let Some(store) = open_store() else { return };
    let owner = unique_owner();

    let approve = label(&owner, PullRequestAction::Labeled).into_partial(at(10, 0)).unwrap();
    store.pull_requests.add(&approve).expect("approve");
    let mut closed = event(&owner, PullRequestAction::Closed);
    closed.merged = true;
    let merged = store.pull_requests.add(&closed.into_partial(at(10, 45)).unwrap()).expect("merge");

    assert_eq!(merged.time_to_merge, Duration::minutes(45));
    assert_eq!(merged.time_to_review, Duration::minutes(45));
}

#[test]
fn reviews_out_of_order_give_the_same_row() {
    let Some(store) = open_store() else { return };
    let (first, second) = (unique_owner(), unique_owner());

    for (owner, order) in [(&first, ["carol", "alice", "bob"]), (&second, ["bob", "carol", "alice"])] {
        for reviewer in order {
            let partial = review(owner, reviewer).into_partial(at(11, 0)).unwrap();
            store.pull_requests.add(&partial).expect("review");
        }
    }
    let (a, b) = (stored(&first), stored(&second));
    assert_eq!(a.reviews, 3);
    assert_eq!(a.reviewers, b.reviewers);
    assert_eq!(a.reviewers, vec!["alice".to_string(), "bob".to_string(), "carol".to_string()]);
}

#[test]
fn returned_row_matches_stored_row_with_sub_microsecond_times() {
    let Some(store) = open_store() else { return };
    let owner = unique_owner();
    let precise = at(10, 0) + Duration::nanoseconds(987_654_321);

    let ready = event(&owner, PullRequestAction::ReadyForReview).into_partial(precise).unwrap();
    let returned = store.pull_requests.add(&ready).expect("ready");
    assert_eq!(returned.ready_for_review_time, Some(at(10, 0) + Duration::microseconds(987_654)));
    assert_eq!(stored(&owner), returned);

    // Un parcial armado a mano (sin pasar por into_partial) tampoco diverge.
    let mut manual = PullRequest::new(owner.clone(), "api", 7);
    manual.merged_time = Some(precise);
    let returned = store.pull_requests.add(&manual).expect("merge");
    assert_eq!(stored(&owner), returned);
}

#[test]
fn events_without_author_keep_the_stored_author() {
    let Some(store) = open_store() else { return };
    let owner = unique_owner();

    store.pull_requests
         .add(&event(&owner, PullRequestAction::Opened).into_partial(at(9, 0)).unwrap())
         .expect("opened");
    let mut anonymous = review(&owner, "bob");
    anonymous.author = String::new();
    anonymous.state = String::new();
    store.pull_requests.add(&anonymous.into_partial(at(9, 30)).unwrap()).expect("review");

    let row = stored(&owner);
    assert_eq!(row.author, "dave");
    assert_eq!(row.state, "open");
    assert_eq!(row.reviews, 1);
}

#[test]
fn unrelated_label_refreshes_state() {
    let Some(store) = open_store() else { return };
    let owner = unique_owner();

    store.pull_requests
         .add(&event(&owner, PullRequestAction::Opened).into_partial(at(9, 0)).unwrap())
         .expect("opened");
    let mut wip = event(&owner, PullRequestAction::Labeled);
    wip.label = Some("wip".into());
    wip.state = "closed".into();
    let row = store.pull_requests.add(&wip.into_partial(at(9, 10)).unwrap()).expect("label");

    assert_eq!(row.state, "closed");
    assert_eq!(row.approved_time, None);
    assert_eq!(row.creation_time, Some(at(9, 0)));
}

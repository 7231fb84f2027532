use harvester_core::{JobCounts, JobQueue, JobStatus, Session, PlaceRecord};
use pretty_assertions::assert_eq;

#[test]
fn next_pending_is_fifo_and_skips_busy_jobs() {
    let mut queue = JobQueue::new(3);
    queue.extend(["https://a.test/1", "https://a.test/2", "https://a.test/3"]);

    queue.mark_in_flight("https://a.test/1");
    assert_eq!(queue.next_pending().map(|j| j.id.as_str()), Some("https://a.test/2"));

    queue.mark_completed("https://a.test/2", "k2");
    assert_eq!(queue.next_pending().map(|j| j.id.as_str()), Some("https://a.test/3"));

    queue.release("https://a.test/1");
    assert_eq!(queue.next_pending().map(|j| j.id.as_str()), Some("https://a.test/1"));
}

#[test]
fn retry_budget_is_bounded() {
    let mut queue = JobQueue::new(3);
    queue.push("https://a.test/1");

    assert_eq!(queue.increment_retry("https://a.test/1"), Some(1));
    assert_eq!(queue.increment_retry("https://a.test/1"), Some(2));
    assert!(!queue.retries_exhausted("https://a.test/1"));
    assert_eq!(queue.increment_retry("https://a.test/1"), Some(3));
    assert!(queue.retries_exhausted("https://a.test/1"));
    assert!(queue.next_pending().is_none());
}

#[test]
fn completed_jobs_are_not_demoted() {
    let mut queue = JobQueue::new(3);
    queue.push("https://a.test/1");
    queue.mark_completed("https://a.test/1", "k1");

    assert!(!queue.mark_in_flight("https://a.test/1"));
    assert!(!queue.mark_failed("https://a.test/1"));
    assert_eq!(queue.increment_retry("https://a.test/1"), Some(0));
    assert_eq!(
        queue.get("https://a.test/1").map(|j| j.status),
        Some(JobStatus::Completed)
    );
}

#[test]
fn replace_keeps_processing_history() {
    let mut queue = JobQueue::new(3);
    queue.push("https://a.test/1");
    queue.mark_completed("https://a.test/1", "k1");

    let stats = queue.replace(["https://a.test/2", "https://a.test/2#frag"]);
    assert_eq!((stats.enqueued, stats.skipped), (1, 1));
    assert!(queue.is_processed("https://a.test/1"));
    assert!(!queue.contains("https://a.test/1"));
}

#[test]
fn counts_by_status() {
    let mut queue = JobQueue::new(1);
    queue.extend(["https://a.test/1", "https://a.test/2", "https://a.test/3", "https://a.test/4"]);
    queue.mark_in_flight("https://a.test/1");
    queue.mark_completed("https://a.test/2", "k");
    queue.mark_failed("https://a.test/3");

    assert_eq!(
        queue.counts(),
        JobCounts {
            pending: 1,
            in_flight: 1,
            completed: 1,
            failed: 1,
        }
    );
}

#[test]
fn recollecting_urls_restores_completed_status_from_results() {
    let mut session = Session::default();
    session.set_collected_urls(&["https://a.test/1".to_string()]);
    session.record_result(
        "https://a.test/1",
        PlaceRecord {
            place_id: "k1".into(),
            ..PlaceRecord::default()
        },
    );

    session.set_collected_urls(&["https://a.test/1".to_string(), "https://a.test/2".to_string()]);

    assert_eq!(
        session.jobs().get("https://a.test/1").map(|j| j.status),
        Some(JobStatus::Completed)
    );
    assert_eq!(session.jobs().next_pending().map(|j| j.id.as_str()), Some("https://a.test/2"));
}

#[test]
fn reset_empties_every_field() {
    let mut session = Session::new(5);
    session.set_collected_urls(&["https://a.test/1".to_string()]);
    session.set_active_job(Some("https://a.test/1".into()));
    session.set_complete(true);
    session.reset();

    assert_eq!(session, Session::new(5));
}

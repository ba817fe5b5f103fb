use super::*;

#[test]
fn test_delta_is_cumulative_minus_sent() {
    let mut tally = MatchTally::new();
    tally.update_score(Score::new(3, 1, 1));
    tally.record_crash();

    let delta = tally.delta();
    assert_eq!(
        delta,
        ResultDelta {
            wins: 3,
            losses: 1,
            draws: 1,
            crashes: 1,
            timelosses: 0
        }
    );

    tally.acknowledge(&delta);
    assert_eq!(tally.sent(), Score::new(3, 1, 1));
    assert_eq!(tally.pending_crashes(), 0);
    assert!(tally.delta().is_empty());
}

#[test]
fn test_unacknowledged_delta_grows() {
    let mut tally = MatchTally::new();
    tally.update_score(Score::new(3, 1, 1));
    tally.record_timeloss();
    // first upload fails: nothing is acknowledged

    tally.update_score(Score::new(5, 3, 2));
    tally.record_timeloss();

    let delta = tally.delta();
    assert_eq!(delta.score(), Score::new(5, 3, 2));
    assert_eq!(delta.timelosses, 2);
}

#[test]
fn test_regressing_score_is_ignored() {
    let mut tally = MatchTally::new();
    tally.update_score(Score::new(4, 1, 0));
    let delta = tally.delta();
    tally.acknowledge(&delta);

    assert!(!tally.update_score(Score::new(3, 1, 0)));
    assert_eq!(tally.cumulative(), Score::new(4, 1, 0));
    assert!(tally.sent().total_games() <= tally.cumulative().total_games());
}

#[test]
fn test_acknowledge_keeps_events_recorded_after_delta() {
    let mut tally = MatchTally::new();
    tally.update_score(Score::new(2, 2, 1));
    tally.record_crash();
    let delta = tally.delta();

    tally.record_crash();
    tally.acknowledge(&delta);

    assert_eq!(tally.pending_crashes(), 1);
}

#[test]
fn test_total_games_saturates() {
    assert_eq!(Score::new(2, 3, 4).total_games(), 9);
    assert_eq!(Score::new(u32::MAX, 1, 0).total_games(), u32::MAX);
}

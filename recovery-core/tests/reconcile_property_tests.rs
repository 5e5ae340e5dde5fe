// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Property tests for recovery::reconcile and checkpoint ordering

mod common;

use proptest::prelude::*;

use common::fixtures::*;
use common::strategies::*;
use recovery_core::*;

fn local_at(attempt: &PendingRecoveryAttempt, stage: u8) -> LocalRecoveryAttemptProgress {
    LocalRecoveryAttemptProgress {
        attempt: attempt.clone(),
        checkpoint: checkpoint_at(stage),
    }
}

fn is_maybe_no_longer(recovery: &Recovery) -> bool {
    matches!(
        recovery,
        Recovery::StillRecovering(StillRecovering::ServerIndependent(
            ServerIndependentRecovery::MaybeNoLongerRecovering { .. }
        ))
    )
}

proptest! {
    #[test]
    fn prop_reconcile_is_deterministic(
        stage in stage_strategy(),
        shape in server_shape_strategy()
    ) {
        let hardware = FakeHardware::new().unwrap();
        let attempt = pending_attempt(&hardware, 40);
        let local = local_at(&attempt, stage);
        let server = server_state(shape, &attempt);

        let first = reconcile(Some(&local), &server, &identity());
        let second = reconcile(Some(&local), &server, &identity());

        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_conflicting_snapshot_wins_at_every_stage(
        stage in stage_strategy(),
        shape in conflicting_shape_strategy(),
    ) {
        let hardware = FakeHardware::new().unwrap();
        let attempt = pending_attempt(&hardware, 40);
        let server = server_state(shape, &attempt);

        let rendered = reconcile(Some(&local_at(&attempt, stage)), &server, &identity());

        prop_assert_eq!(
            rendered,
            Recovery::SomeoneElseIsRecovering(server.snapshot().unwrap().clone())
        );
    }

    #[test]
    fn prop_server_independent_stages_ignore_absence(
        stage in 2u8..8,
        shape in prop_oneof![
            Just(ServerShape::Absent),
            Just(ServerShape::Matching),
            Just(ServerShape::OtherAccount),
        ],
    ) {
        let hardware = FakeHardware::new().unwrap();
        let attempt = pending_attempt(&hardware, 40);
        let server = server_state(shape, &attempt);

        let rendered = reconcile(Some(&local_at(&attempt, stage)), &server, &identity());

        prop_assert!(!is_maybe_no_longer(&rendered));
        let still = rendered.still_recovering().unwrap();
        prop_assert_eq!(still.attempt(), &attempt);
        prop_assert_eq!(still.factor_to_recover(), PhysicalFactor::Hardware);
    }

    #[test]
    fn prop_server_dependent_stages_follow_absence(stage in 0u8..2) {
        let hardware = FakeHardware::new().unwrap();
        let attempt = pending_attempt(&hardware, 40);
        let local = local_at(&attempt, stage);

        let absent = reconcile(Some(&local), &ServerRecoveryState::Absent, &identity());
        prop_assert!(is_maybe_no_longer(&absent));

        let foreign = server_state(ServerShape::OtherAccount, &attempt);
        let foreign = reconcile(Some(&local), &foreign, &identity());
        prop_assert!(is_maybe_no_longer(&foreign));

        let confirmed = reconcile(Some(&local), &ServerRecoveryState::ConfirmedAbsent, &identity());
        prop_assert_eq!(
            confirmed,
            Recovery::NoLongerRecovering { factor_to_recover: PhysicalFactor::Hardware }
        );
    }

    #[test]
    fn prop_without_local_progress_only_server_matters(shape in server_shape_strategy()) {
        let hardware = FakeHardware::new().unwrap();
        let attempt = pending_attempt(&hardware, 40);
        let server = server_state(shape, &attempt);

        let rendered = reconcile(None, &server, &identity());

        match shape {
            ServerShape::Matching | ServerShape::OtherDestination | ServerShape::OtherFactor => {
                prop_assert_eq!(
                    rendered,
                    Recovery::SomeoneElseIsRecovering(server.snapshot().unwrap().clone())
                );
            }
            ServerShape::Absent | ServerShape::ConfirmedAbsent | ServerShape::OtherAccount => {
                prop_assert_eq!(rendered, Recovery::NoActiveRecovery);
            }
        }
    }

    #[test]
    fn prop_store_checkpoints_never_go_backwards(
        stages in proptest::collection::vec(stage_strategy(), 1..20),
    ) {
        let hardware = FakeHardware::new().unwrap();
        let attempt = pending_attempt(&hardware, 40);
        let store = RecoveryStore::new(Box::new(storage()), identity()).unwrap();

        let mut committed: Option<u8> = None;
        for stage in stages {
            let allowed = match committed {
                None => stage == 0,
                Some(current) => stage == current || stage == current + 1,
            };
            let result = store.set_local_recovery_progress(local_at(&attempt, stage));

            prop_assert_eq!(result.is_ok(), allowed);
            if allowed {
                committed = Some(stage);
            }
            prop_assert_eq!(
                store.local_progress().map(|p| p.checkpoint.stage()),
                committed
            );
        }
    }
}

#[test]
fn test_matching_snapshot_renders_initiated_recovery_window() {
    let hardware = FakeHardware::new().unwrap();
    let attempt = pending_attempt(&hardware, 40);
    let server = server_state(ServerShape::Matching, &attempt);

    let rendered = reconcile(Some(&local_at(&attempt, 0)), &server, &identity());

    let Recovery::StillRecovering(StillRecovering::ServerDependent(
        ServerDependentRecovery::InitiatedRecovery(initiated),
    )) = &rendered
    else {
        panic!("expected InitiatedRecovery, got {:?}", rendered);
    };
    assert_eq!(initiated.delay_start_time, START);
    assert_eq!(initiated.delay_end_time, START + DELAY.as_secs());
    assert!(!initiated.can_complete(START + 60));
    assert_eq!(initiated.delay_remaining(START + 60), DELAY.as_secs() - 60);
    assert!(initiated.can_complete(START + DELAY.as_secs()));
}

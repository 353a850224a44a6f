// tests/runner_properties.rs

use proptest::prelude::*;
use pushdeploy::errors::DeployError;
use pushdeploy::exec::{CommandRunner, Script, Step};
use pushdeploy::transport::Transport;
use pushdeploy::types::FailurePolicy;
use pushdeploy_test_utils::builders::test_target;
use pushdeploy_test_utils::fake_transport::FakeTransport;

/// (continue on failure, exit code) per step.
fn plan_strategy() -> impl Strategy<Value = Vec<(bool, i32)>> {
    proptest::collection::vec((any::<bool>(), prop_oneof![3 => Just(0), 1 => 1..130i32]), 0..12)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// Commands are issued in declared order and stop right after the first
    /// failing `abort` step; `continue` failures never stop the script.
    #[test]
    fn issued_prefix_matches_first_abort_failure(plan in plan_strategy()) {
        let mut transport = FakeTransport::new();
        let mut steps = Vec::new();
        for (i, (continue_on_failure, code)) in plan.iter().enumerate() {
            if *code != 0 {
                transport = transport.fail_at(i, *code, "boom\n");
            }
            let policy = if *continue_on_failure { FailurePolicy::Continue } else { FailurePolicy::Abort };
            steps.push(Step::new(format!("step-{i}")).with_policy(policy));
        }
        let log = transport.log();
        let script = Script::new(steps);

        let first_abort = plan
            .iter()
            .position(|(continue_on_failure, code)| *code != 0 && !continue_on_failure);

        let outcome = runtime().block_on(async {
            let mut conn = transport.connect(&test_target()).await?;
            CommandRunner::new().run(conn.as_mut(), &script).await
        });

        let issued = log.commands();
        let expected_len = first_abort.map(|i| i + 1).unwrap_or(plan.len());
        prop_assert_eq!(issued.len(), expected_len);
        for (i, cmd) in issued.iter().enumerate() {
            prop_assert_eq!(cmd, &format!("step-{i}"));
        }

        match (first_abort, outcome) {
            (None, Ok(result)) => prop_assert_eq!(result.exit_code, 0),
            (Some(i), Err(DeployError::Command { step, result, .. })) => {
                prop_assert_eq!(step, i);
                prop_assert_eq!(result.exit_code, plan[i].1);
            }
            (expected, got) => prop_assert!(false, "expected abort at {:?}, got {:?}", expected, got),
        }
    }
}

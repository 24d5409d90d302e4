//! Property-based tests for feedback history and time estimates

#[cfg(test)]
mod tests {
    use crate::feedback::{FeedbackLevel, FeedbackManager};
    use crate::listener::ProgressListener;
    use crate::models::{ExecutionPlan, ExecutionResult, ExecutionStep};
    use proptest::prelude::*;
    use serde_json::json;

    fn arb_level() -> impl Strategy<Value = FeedbackLevel> {
        prop_oneof![
            Just(FeedbackLevel::Info),
            Just(FeedbackLevel::Success),
            Just(FeedbackLevel::Warning),
            Just(FeedbackLevel::Error),
            Just(FeedbackLevel::Debug),
        ]
    }

    fn plan_with(steps: usize) -> ExecutionPlan {
        let steps = (0..steps)
            .map(|i| ExecutionStep::blocking(format!("step-{}", i), format!("Step {}", i), || Ok(json!(null))))
            .collect();
        ExecutionPlan::new("prop", "", steps).unwrap()
    }

    proptest! {
        /// History never exceeds its capacity and keeps the newest messages
        #[test]
        fn prop_history_is_bounded(
            max_history in 1usize..20,
            levels in prop::collection::vec(arb_level(), 0..60),
        ) {
            let manager = FeedbackManager::new(max_history);
            for (i, level) in levels.iter().enumerate() {
                manager.add_message(*level, format!("message {}", i), None, None);
            }

            let messages = manager.messages();
            prop_assert_eq!(messages.len(), levels.len().min(max_history));
            if let Some(last) = messages.last() {
                prop_assert_eq!(&last.message, &format!("message {}", levels.len() - 1));
            }
        }

        /// A level filter only narrows the recent window
        #[test]
        fn prop_recent_filter_is_subset_of_window(
            levels in prop::collection::vec(arb_level(), 0..40),
            count in 0usize..50,
            filter in arb_level(),
        ) {
            let manager = FeedbackManager::new(100);
            for level in &levels {
                manager.add_message(*level, "m", None, None);
            }

            let window = manager.get_recent_messages(count, None);
            let filtered = manager.get_recent_messages(count, Some(filter));
            prop_assert_eq!(window.len(), levels.len().min(count));
            prop_assert!(filtered.len() <= window.len());
            prop_assert!(filtered.iter().all(|m| m.level == filter));
        }

        /// Remaining time is the unfinished step count times the average
        #[test]
        fn prop_remaining_time_scales_with_unfinished_steps(
            total in 1usize..12,
            finished_share in 0usize..12,
            avg in 0.1f64..100.0,
        ) {
            let finished = finished_share.min(total);
            let plan = plan_with(total);
            let manager = FeedbackManager::default();

            tokio_test::block_on(async {
                manager.on_plan_start(&plan).await;
                for step in plan.steps().iter().take(finished) {
                    manager.on_step_start(step).await;
                    manager
                        .on_step_complete(step, &ExecutionResult::completed(&step.id, json!(1)))
                        .await;
                }
            });

            let expected = (total - finished) as f64 * avg;
            prop_assert!((manager.estimate_remaining_time(avg) - expected).abs() < 1e-9);
            prop_assert_eq!(manager.estimate_remaining_time(0.0), 0.0);
        }
    }
}

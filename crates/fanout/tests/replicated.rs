// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Fan-out, rollback and load-balancing behavior of `ReplicatedCache`.

use fanout::{Error, ErrorKind, LockTokens, ReplicatedCache};
use fanout_region::{
    LockToken, RegionStrategy,
    testing::{MockStrategy, StrategyOp},
};
use tick::Clock;

type Mock = MockStrategy<String, i32>;
type TestResult = Result<(), Error>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn key(s: &str) -> String {
    s.to_string()
}

fn mocks(n: usize) -> Vec<Mock> {
    (0..n).map(|_| MockStrategy::new("r")).collect()
}

fn cache(strategies: &[Mock]) -> ReplicatedCache<String, i32, Mock> {
    ReplicatedCache::builder::<String, i32>(Clock::new_frozen(), "r")
        .strategies(strategies.iter().cloned())
        .build()
        .expect("build failed")
}

fn locks(strategy: &Mock) -> usize {
    strategy.count_operations(StrategyOp::is_lock)
}

fn unlocks(strategy: &Mock) -> usize {
    strategy.count_operations(StrategyOp::is_unlock)
}

#[test]
fn put_reaches_every_strategy() -> TestResult {
    block_on(async {
        let strategies = mocks(3);
        let cache = cache(&strategies);

        cache.put(&key("x"), &1).await?;

        for strategy in &strategies {
            assert_eq!(strategy.value(&key("x")), Some(1));
        }
        Ok(())
    })
}

#[test]
fn repeated_reads_after_put_all_return_value() -> TestResult {
    block_on(async {
        let strategies = mocks(3);
        let cache = cache(&strategies);

        cache.put(&key("x"), &1).await?;

        for _ in 0..100 {
            assert_eq!(cache.get(&key("x")).await?, Some(1));
        }
        Ok(())
    })
}

#[test]
fn every_strategy_is_reachable_by_get() -> TestResult {
    block_on(async {
        let strategies = mocks(3);
        let cache = cache(&strategies);

        for _ in 0..1000 {
            cache.get(&key("x")).await?;
        }

        for (index, strategy) in strategies.iter().enumerate() {
            let reads = strategy.count_operations(|op| matches!(op, StrategyOp::Get(_)));
            assert!(reads > 0, "strategy {index} was never read");
        }
        Ok(())
    })
}

#[test]
fn get_many_is_served_by_one_strategy() -> TestResult {
    block_on(async {
        let strategies = mocks(3);
        let cache = cache(&strategies);
        cache.put_many(&[key("a"), key("b")], &[1, 2]).await?;

        let values = cache.get_many(&[key("b"), key("missing"), key("a")]).await?;
        assert_eq!(values, vec![Some(2), None, Some(1)]);

        let batches: usize = strategies
            .iter()
            .map(|s| s.count_operations(|op| matches!(op, StrategyOp::GetMany(_))))
            .sum();
        assert_eq!(batches, 1);
        Ok(())
    })
}

#[test]
fn put_failure_leaves_earlier_strategies_written() {
    block_on(async {
        let strategies = mocks(4);
        strategies[2].fail_when(|op| matches!(op, StrategyOp::Put { .. }));
        let cache = cache(&strategies);

        let error = cache.put(&key("x"), &1).await.expect_err("put should fail");
        assert_eq!(error.kind(), ErrorKind::Backend);

        assert!(strategies[0].contains_key(&key("x")));
        assert!(strategies[1].contains_key(&key("x")));
        assert!(!strategies[2].contains_key(&key("x")));
        assert!(!strategies[3].contains_key(&key("x")));
        assert_eq!(strategies[3].count_operations(|_| true), 1, "only validate should reach strategy 3");
    });
}

#[test]
fn put_many_rejects_mismatched_lengths_before_any_backend() {
    block_on(async {
        let strategies = mocks(2);
        let cache = cache(&strategies);
        strategies.iter().for_each(Mock::clear_operations);

        let error = cache
            .put_many(&[key("a"), key("b")], &[1])
            .await
            .expect_err("mismatched lengths should fail");
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);

        for strategy in &strategies {
            assert!(strategy.operations().is_empty());
        }
    });
}

#[test]
fn remove_reports_any_presence() -> TestResult {
    block_on(async {
        let strategies = mocks(3);
        let cache = cache(&strategies);

        strategies[1].put(&key("x"), &1).await?;
        assert!(cache.remove(&key("x")).await?);
        assert!(!cache.remove(&key("x")).await?);

        for strategy in &strategies {
            assert_eq!(strategy.count_operations(|op| matches!(op, StrategyOp::Remove(_))), 2);
        }
        Ok(())
    })
}

#[test]
fn remove_failure_stops_fan_out() {
    block_on(async {
        let strategies = mocks(3);
        strategies[0].fail_when(|op| matches!(op, StrategyOp::Remove(_)));
        let cache = cache(&strategies);

        cache.remove(&key("x")).await.expect_err("remove should fail");
        assert_eq!(strategies[1].count_operations(|op| matches!(op, StrategyOp::Remove(_))), 0);
    });
}

#[test]
fn clear_empties_every_strategy() -> TestResult {
    block_on(async {
        let strategies = mocks(3);
        let cache = cache(&strategies);
        cache.put_many(&[key("a"), key("b")], &[1, 2]).await?;

        cache.clear().await?;

        for strategy in &strategies {
            assert_eq!(strategy.entry_count(), 0);
        }
        Ok(())
    })
}

#[test]
fn lock_failure_rolls_back_earlier_strategies() {
    block_on(async {
        let strategies = mocks(3);
        strategies[1].fail_when(StrategyOp::is_lock);
        let cache = cache(&strategies);

        let error = cache.lock(&key("k")).await.expect_err("lock should fail");
        assert_eq!(error.kind(), ErrorKind::Backend);

        assert_eq!(locks(&strategies[0]), 1);
        assert_eq!(unlocks(&strategies[0]), 1, "strategy 0 should be unlocked exactly once");
        assert!(!strategies[0].is_locked(&key("k")));

        assert_eq!(locks(&strategies[1]), 1);
        assert_eq!(unlocks(&strategies[1]), 0);

        assert_eq!(locks(&strategies[2]), 0, "strategy 2 should never be called");
        assert_eq!(unlocks(&strategies[2]), 0);
    });
}

#[test]
fn lock_failure_on_first_strategy_needs_no_rollback() {
    block_on(async {
        let strategies = mocks(2);
        strategies[0].fail_when(StrategyOp::is_lock);
        let cache = cache(&strategies);

        cache.lock(&key("k")).await.expect_err("lock should fail");
        assert_eq!(unlocks(&strategies[0]), 0);
        assert_eq!(locks(&strategies[1]), 0);
    });
}

#[test]
fn lock_contention_keeps_error_kind() -> TestResult {
    block_on(async {
        let strategies = mocks(2);
        let cache = cache(&strategies);

        let _held = strategies[1].lock(&key("k")).await?;
        let error = cache.lock(&key("k")).await.expect_err("contended lock should fail");
        assert_eq!(error.kind(), ErrorKind::LockNotAcquired);
        assert!(!strategies[0].is_locked(&key("k")));
        Ok(())
    })
}

#[test]
fn rollback_failure_still_returns_original_error() {
    block_on(async {
        let strategies = mocks(3);
        strategies[0].fail_when(StrategyOp::is_unlock);
        strategies[2].fail_when(StrategyOp::is_lock);
        let cache = cache(&strategies);

        let error = cache.lock(&key("k")).await.expect_err("lock should fail");
        assert_eq!(error.kind(), ErrorKind::Backend);
        assert_eq!(unlocks(&strategies[0]), 1);
        assert_eq!(unlocks(&strategies[1]), 1);
        assert!(!strategies[1].is_locked(&key("k")));
    });
}

#[test]
fn lock_many_is_all_or_nothing() -> TestResult {
    block_on(async {
        let strategies = mocks(3);
        let cache = cache(&strategies);
        let keys = [key("a"), key("b")];

        let _held = strategies[2].lock(&key("b")).await?;
        let error = cache.lock_many(&keys).await.expect_err("lock_many should fail");
        assert_eq!(error.kind(), ErrorKind::LockNotAcquired);

        for strategy in &strategies[..2] {
            assert!(!strategy.is_locked(&key("a")));
            assert!(!strategy.is_locked(&key("b")));
            assert_eq!(
                strategy.count_operations(|op| matches!(op, StrategyOp::UnlockMany { .. })),
                1
            );
        }
        assert!(!strategies[2].is_locked(&key("a")));
        Ok(())
    })
}

#[test]
fn lock_then_unlock_releases_every_backend() -> TestResult {
    block_on(async {
        let strategies = mocks(3);
        let cache = cache(&strategies);

        let tokens = cache.lock(&key("k")).await?;
        assert_eq!(tokens.len(), 3);
        for strategy in &strategies {
            assert!(strategy.is_locked(&key("k")));
        }

        cache.unlock(&key("k"), &tokens).await?;
        for strategy in &strategies {
            assert!(!strategy.is_locked(&key("k")));
        }

        cache.lock(&key("k")).await?;
        Ok(())
    })
}

#[test]
fn lock_many_then_unlock_many_releases_every_backend() -> TestResult {
    block_on(async {
        let strategies = mocks(2);
        let cache = cache(&strategies);
        let keys = [key("a"), key("b")];

        let tokens = cache.lock_many(&keys).await?;
        cache.unlock_many(&keys, &tokens).await?;

        for strategy in &strategies {
            assert_eq!(strategy.lock_count(), 0);
        }
        Ok(())
    })
}

#[test]
fn tokens_are_index_aligned_with_strategies() -> TestResult {
    block_on(async {
        let strategies = vec![Mock::new("node-a"), Mock::new("node-b")];
        let cache = cache(&strategies);

        let tokens = cache.lock(&key("k")).await?;
        assert_ne!(tokens.get(0), tokens.get(1));

        let mut swapped = tokens.clone().into_vec();
        swapped.reverse();
        cache.unlock(&key("k"), &LockTokens::from(swapped)).await?;
        for strategy in &strategies {
            assert!(strategy.is_locked(&key("k")), "swapped tokens must not release locks");
        }

        cache.unlock(&key("k"), &tokens).await?;
        Ok(())
    })
}

#[test]
fn unlock_attempts_every_strategy_and_returns_first_error() -> TestResult {
    block_on(async {
        let strategies = mocks(3);
        let cache = cache(&strategies);
        let tokens = cache.lock(&key("k")).await?;

        strategies[0].fail_when(StrategyOp::is_unlock);
        strategies[1].fail_when(StrategyOp::is_unlock);
        let error = cache.unlock(&key("k"), &tokens).await.expect_err("unlock should fail");
        assert_eq!(error.kind(), ErrorKind::Backend);

        assert_eq!(unlocks(&strategies[2]), 1);
        assert!(!strategies[2].is_locked(&key("k")));
        assert!(strategies[0].is_locked(&key("k")));
        Ok(())
    })
}

#[test]
fn unlock_rejects_wrong_token_count() {
    block_on(async {
        let strategies = mocks(3);
        let cache = cache(&strategies);

        let tokens = LockTokens::from(vec![LockToken::new("only-one")]);
        let error = cache.unlock(&key("k"), &tokens).await.expect_err("count mismatch should fail");
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);

        let error = cache
            .unlock_many(&[key("k")], &tokens)
            .await
            .expect_err("count mismatch should fail");
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);

        for strategy in &strategies {
            assert_eq!(unlocks(strategy), 0);
        }
    });
}

#[test]
fn accessors() {
    let strategies = mocks(2);
    let cache = cache(&strategies);

    assert_eq!(cache.region_name(), "r");
    assert_eq!(cache.strategy_count(), 2);
    assert_eq!(cache.strategies().len(), 2);
    assert!(cache.next_timestamp() < cache.next_timestamp());
    cache.destroy();
}

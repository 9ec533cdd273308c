//! Property tests: readers see a committed transaction entirely or not at all.

use std::collections::BTreeMap;
use std::sync::Arc;

use keel_commit::{InMemoryResourceManager, ResourceManager};
use keel_types::{ResourceDefinition, ResourceSpec, Transaction};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

/// Transaction `t<index>` with `size` primitives, grouped when large enough
fn transaction(index: usize, size: usize) -> Transaction {
    let mut objects: Vec<_> = (0..size)
        .map(|i| {
            ResourceDefinition::new(ResourceSpec::Primitive {
                id: format!("t{}-p{}", index, i),
                agent: "systemd:dummy".into(),
                params: BTreeMap::new(),
                ops: BTreeMap::new(),
                meta: BTreeMap::new(),
            })
        })
        .collect();
    if size > 1 {
        let members = objects.iter().map(|o| o.id().to_string()).collect();
        objects.push(ResourceDefinition::new(ResourceSpec::Group {
            id: format!("t{}-g", index),
            members,
        }));
    }
    Transaction::new(format!("t{}", index), objects).unwrap()
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn snapshots_never_show_partial_transactions(
        sizes in prop::collection::vec(1usize..6, 1..8),
    ) {
        let rt = runtime();
        let violations = rt.block_on(async {
            let manager = Arc::new(InMemoryResourceManager::new());
            let transactions: Vec<_> = sizes
                .iter()
                .enumerate()
                .map(|(i, size)| transaction(i, *size))
                .collect();

            let writer = {
                let manager = manager.clone();
                let transactions = transactions.clone();
                tokio::spawn(async move {
                    for tx in &transactions {
                        manager.commit(tx).await.unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            };

            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let manager = manager.clone();
                    let transactions = transactions.clone();
                    tokio::spawn(async move {
                        let mut violations = 0;
                        for _ in 0..50 {
                            let cib = manager.snapshot().await;
                            for tx in &transactions {
                                let present = tx.ids().filter(|id| cib.contains(id)).count();
                                if present != 0 && present != tx.objects.len() {
                                    violations += 1;
                                }
                            }
                            tokio::task::yield_now().await;
                        }
                        violations
                    })
                })
                .collect();

            writer.await.unwrap();
            let mut total = 0;
            for reader in readers {
                total += reader.await.unwrap();
            }

            let cib = manager.snapshot().await;
            assert_eq!(cib.epoch, transactions.len() as u64);
            total
        });
        prop_assert_eq!(violations, 0);
    }

    #[test]
    fn rejected_transactions_leave_no_trace(
        size in 1usize..6,
        broken_member in "[a-z]{4,8}",
    ) {
        let rt = runtime();
        let (before, after) = rt.block_on(async {
            let manager = InMemoryResourceManager::new();
            manager.commit(&transaction(0, size)).await.unwrap();
            let before = manager.snapshot().await;

            let mut broken = transaction(1, size);
            broken.objects.push(ResourceDefinition::new(ResourceSpec::Group {
                id: "broken-g".into(),
                members: vec![format!("missing-{}", broken_member)],
            }));
            assert!(manager.commit(&broken).await.is_err());
            (before, manager.snapshot().await)
        });
        prop_assert_eq!(before.epoch, after.epoch);
        prop_assert_eq!(before.ids(), after.ids());
    }
}

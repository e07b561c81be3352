//! Tests for conflict classification and prechecks

use super::*;
use crate::test_support::{SpyCall, SpyExecutor};
use std::sync::Arc;

fn stat(name: &str, rows: u64) -> TableStat {
    TableStat::new(name, rows, rows * 64)
}

fn detector(spy: &Arc<SpyExecutor>) -> ConflictDetector<SpyExecutor> {
    ConflictDetector::new(TableStatsCollector::new(spy.clone()))
}

fn request(mode: MigrationMode) -> MigrationRequest {
    MigrationRequest::new("src", "shop", "dst", "shop", mode)
}

mod classify_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_absent_target_is_informational() {
        for mode in MigrationMode::ALL {
            let check = classify(&stat("orders", 10), None, mode);
            assert!(!check.blocking);
            assert_eq!(check.reasons, vec![CheckReason::TargetAbsent]);
            assert_eq!(check.target_rows, 0);
            assert!(!check.target_exists());
        }
    }

    #[test]
    fn test_existing_table_blocks_schema_modes() {
        for mode in [MigrationMode::SchemaOnly, MigrationMode::Both] {
            let check = classify(&stat("orders", 120), Some(&stat("orders", 0)), mode);
            assert!(check.blocking);
            assert!(check.reasons.contains(&CheckReason::TargetTableExists));
        }
    }

    #[test]
    fn test_empty_target_never_blocks_on_rows() {
        let check = classify(
            &stat("orders", 120),
            Some(&stat("orders", 0)),
            MigrationMode::DataOnly,
        );
        assert!(!check.blocking);
        assert!(check.reasons.is_empty());
        assert!(check.target_exists());

        let check = classify(
            &stat("orders", 120),
            Some(&stat("orders", 0)),
            MigrationMode::Both,
        );
        assert!(!check.reasons.contains(&CheckReason::TargetHasRows));
    }

    #[test]
    fn test_populated_target_blocks_data_modes() {
        let check = classify(
            &stat("orders", 120),
            Some(&stat("orders", 3)),
            MigrationMode::DataOnly,
        );
        assert!(check.blocking);
        assert_eq!(check.reasons, vec![CheckReason::TargetHasRows]);
        assert_eq!(check.target_rows, 3);

        let check = classify(
            &stat("orders", 120),
            Some(&stat("orders", 3)),
            MigrationMode::Both,
        );
        assert_eq!(
            check.reasons,
            vec![CheckReason::TargetTableExists, CheckReason::TargetHasRows]
        );
        assert_eq!(
            check.reason_text(),
            "target already has a table of this name; target table already has rows"
        );
    }

    #[test]
    fn test_exhaustive_blocking_rule() {
        let targets = [None, Some(0u64), Some(7u64)];
        for mode in MigrationMode::ALL {
            for target_rows in targets {
                let target = target_rows.map(|rows| stat("t", rows));
                let check = classify(&stat("t", 5), target.as_ref(), mode);

                let expected = match target_rows {
                    None => false,
                    Some(rows) => mode.copies_schema() || (mode.copies_data() && rows > 0),
                };
                assert_eq!(check.blocking, expected, "mode={} target={:?}", mode, target_rows);
                assert_eq!(
                    check.blocking,
                    check.reasons.iter().any(|r| r.is_blocking())
                );
            }
        }
    }

    #[test]
    fn test_verdict_blocked_iff_any_check_blocks() {
        let states = [None, Some(0u64), Some(2u64)];
        for mode in MigrationMode::ALL {
            for a in states {
                for b in states {
                    for c in states {
                        let source = vec![stat("a", 1), stat("b", 1), stat("c", 1)];
                        let target: Vec<TableStat> = [("a", a), ("b", b), ("c", c)]
                            .into_iter()
                            .filter_map(|(name, rows)| rows.map(|r| stat(name, r)))
                            .collect();

                        let verdict = evaluate(&request(mode), &source, &target).unwrap();
                        assert_eq!(verdict.checks.len(), 3);
                        assert_eq!(
                            verdict.blocked,
                            verdict.checks.iter().any(|c| c.blocking)
                        );
                        assert_eq!(verdict.is_clear(), verdict.blocking_tables().is_empty());
                    }
                }
            }
        }
    }

    #[test]
    fn test_reason_strings_serialize_verbatim() {
        let check = classify(&stat("orders", 1), None, MigrationMode::Both);
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["reasons"][0], "target table absent");
        assert_eq!(json["sourceRows"], 1);
    }
}

mod working_set_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_selection_means_all_in_source_order() {
        let source = vec![stat("customers", 40), stat("orders", 120)];
        let set = working_set(&source, &BTreeSet::new()).unwrap();
        let names: Vec<&str> = set.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["customers", "orders"]);
    }

    #[test]
    fn test_selection_keeps_source_order() {
        let source = vec![stat("a", 1), stat("b", 1), stat("c", 1)];
        let selected: BTreeSet<String> = ["c".to_string(), "a".to_string()].into();
        let set = working_set(&source, &selected).unwrap();
        let names: Vec<&str> = set.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_missing_selected_table_is_invalid_request() {
        let source = vec![stat("orders", 1)];
        let selected: BTreeSet<String> = ["orders".to_string(), "ghost".to_string()].into();
        let err = working_set(&source, &selected).unwrap_err();
        assert!(matches!(err, MigrationError::InvalidRequest(ref m) if m.contains("ghost")));
    }

    #[test]
    fn test_target_only_tables_are_not_reported() {
        let source = vec![stat("orders", 1)];
        let target = vec![stat("legacy", 9)];
        let verdict = evaluate(&request(MigrationMode::Both), &source, &target).unwrap();
        assert_eq!(verdict.table_names(), vec!["orders".to_string()]);
        assert!(verdict.check("legacy").is_none());
    }
}

mod precheck_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shop_spy() -> SpyExecutor {
        SpyExecutor::new().with_tables("src", "shop", &[("customers", 40), ("orders", 120)])
    }

    #[tokio::test]
    async fn test_orders_conflict_scenario() {
        let spy = Arc::new(shop_spy().with_tables("dst", "shop", &[("orders", 0)]));
        let req = request(MigrationMode::Both).with_tables(["orders", "customers"]);

        let verdict = detector(&spy).precheck(&req).await.unwrap();

        assert!(verdict.blocked);
        let orders = verdict.check("orders").unwrap();
        assert!(orders.blocking);
        assert_eq!(orders.reasons, vec![CheckReason::TargetTableExists]);
        assert_eq!(orders.source_rows, 120);

        let customers = verdict.check("customers").unwrap();
        assert!(!customers.blocking);
        assert_eq!(customers.reasons, vec![CheckReason::TargetAbsent]);
        assert_eq!(verdict.blocking_tables(), vec!["orders"]);
    }

    #[tokio::test]
    async fn test_empty_target_all_tables_clear() {
        let spy = Arc::new(shop_spy());
        let verdict = detector(&spy)
            .precheck(&request(MigrationMode::SchemaOnly))
            .await
            .unwrap();

        assert!(verdict.is_clear());
        assert_eq!(verdict.checks.len(), 2);
        assert!(
            verdict
                .checks
                .iter()
                .all(|c| c.reasons == vec![CheckReason::TargetAbsent])
        );
    }

    #[tokio::test]
    async fn test_precheck_is_idempotent_and_read_only() {
        let spy = Arc::new(shop_spy().with_tables("dst", "shop", &[("orders", 5)]));
        let detector = detector(&spy);
        let req = request(MigrationMode::DataOnly);

        let first = detector.precheck(&req).await.unwrap();
        let second = detector.precheck(&req).await.unwrap();

        assert_eq!(first, second);
        assert!(spy.copy_calls().is_empty());
    }

    #[tokio::test]
    async fn test_self_migration_rejected_before_any_call() {
        let spy = Arc::new(shop_spy());
        let req = MigrationRequest::new("src", "shop", "src", "shop", MigrationMode::Both);

        let err = detector(&spy).precheck(&req).await.unwrap_err();

        assert!(matches!(err, MigrationError::InvalidRequest(_)));
        assert!(spy.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_source_database_gives_empty_clear_verdict() {
        let spy = Arc::new(SpyExecutor::new());
        let verdict = detector(&spy)
            .precheck(&request(MigrationMode::Both))
            .await
            .unwrap();
        assert!(verdict.checks.is_empty());
        assert!(!verdict.blocked);
    }

    #[tokio::test]
    async fn test_unreachable_target_is_connection_error() {
        let spy = Arc::new(shop_spy().unreachable("dst"));
        let err = detector(&spy)
            .precheck(&request(MigrationMode::Both))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MigrationError::Connection { ref connection_id, .. } if connection_id == "dst"
        ));
    }

    #[tokio::test]
    async fn test_failing_statistics_query_is_query_error() {
        let spy = Arc::new(shop_spy().failing_stats("src", "shop"));
        let err = detector(&spy)
            .precheck(&request(MigrationMode::Both))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Query(_)));
    }

    #[tokio::test]
    async fn test_stats_are_read_from_both_sides() {
        let spy = Arc::new(shop_spy());
        detector(&spy)
            .precheck(&request(MigrationMode::Both))
            .await
            .unwrap();

        let calls = spy.calls();
        assert!(calls.contains(&SpyCall::ListStats {
            conn: "src".into(),
            db: "shop".into()
        }));
        assert!(calls.contains(&SpyCall::ListStats {
            conn: "dst".into(),
            db: "shop".into()
        }));
    }
}

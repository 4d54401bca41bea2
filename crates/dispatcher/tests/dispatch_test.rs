#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use groupcall_core::*;
    use groupcall_dispatcher::*;
    use groupcall_testing_utils::{GroupBuilder, InvocationBuilder, MockInvoker};

    fn dispatcher(invoker: &MockInvoker) -> Dispatcher {
        Dispatcher::new(
            DispatcherConfig::default(),
            Arc::new(invoker.clone()),
            "dispatch-test",
            false,
        )
    }

    #[test]
    fn test_round_robin_routing_is_deterministic() {
        let invocation = InvocationBuilder::new("tile")
            .with_scatter_arg((0..10).map(|i| json!(i)).collect())
            .with_mode(DispatchMode::StaticRoundRobin)
            .build();
        let settings = PartitionSettings {
            mode: DispatchMode::StaticRoundRobin,
            ..PartitionSettings::default()
        };

        for _ in 0..5 {
            let partition = CallPartitioner::new()
                .partition(&invocation, 4, &settings)
                .unwrap();
            let routes: Vec<_> = partition.tasks.iter().map(|task| task.member).collect();
            assert_eq!(routes, (0..10).map(|i| i % 4).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_idle_member_picked_before_busy_member() {
        let monitor = WorkerLoadMonitor::new(2);
        // 成员 1 有一个在途作业，成员 0 既没有在途也没有完成的作业
        monitor.on_dispatch(1, 0).await.unwrap();

        assert_eq!(monitor.pick_best_worker().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partition_then_dispatch_resolves_every_slot() {
        let invoker = MockInvoker::new().with_latency(Duration::from_millis(5));
        let dispatcher = dispatcher(&invoker);
        let members = Arc::new(GroupBuilder::new().with_members(3).build());
        let invocation = InvocationBuilder::new("scan")
            .with_scatter_arg((0..7).map(|i| json!(i)).collect())
            .build();

        let partition = CallPartitioner::new()
            .partition(&invocation, members.len(), &PartitionSettings::default())
            .unwrap();
        let results = ResultGroup::pending(partition.tasks.len());
        let report = dispatcher
            .dispatch(
                "scan",
                partition.tasks,
                members,
                DispatchOptions {
                    mode: DispatchMode::Unspecified,
                    buffer_size: 2,
                },
                Collector::Results(&results),
            )
            .await
            .unwrap();

        assert!(results.all_arrived());
        assert_eq!(invoker.call_count(), 7);
        assert_eq!(report.buffered_jobs, 6);
        assert_eq!(report.overflow_jobs, 1);
        for i in 0..7 {
            assert_eq!(results.record(i).unwrap().member_index, i % 3);
        }
    }

    #[tokio::test]
    async fn test_dynamic_jobs_never_exceed_member_count_in_flight() {
        let invoker = MockInvoker::new().with_latency(Duration::from_millis(10));
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                extra_threads: 8,
                ..DispatcherConfig::default()
            },
            Arc::new(invoker.clone()),
            "dispatch-test",
            false,
        );
        let members = Arc::new(GroupBuilder::new().with_members(2).build());
        let invocation = InvocationBuilder::new("burst")
            .with_scatter_arg((0..10).map(|i| json!(i)).collect())
            .build();
        let settings = PartitionSettings {
            mode: DispatchMode::Dynamic,
            ..PartitionSettings::default()
        };
        let partition = CallPartitioner::new()
            .partition(&invocation, 2, &settings)
            .unwrap();
        let results = ResultGroup::pending(partition.tasks.len());

        let report = dispatcher
            .dispatch(
                "burst",
                partition.tasks,
                members,
                DispatchOptions {
                    mode: DispatchMode::Dynamic,
                    buffer_size: 0,
                },
                Collector::Results(&results),
            )
            .await
            .unwrap();

        assert_eq!(report.dynamic_jobs, 10);
        assert!(invoker.max_concurrency() <= 2);
        assert!(results.all_arrived());
    }
}

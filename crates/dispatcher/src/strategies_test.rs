#[cfg(test)]
mod strategies_tests {
    use std::sync::Arc;

    use crate::strategies::*;
    use groupcall_core::{CustomRouting, DispatchMode, GroupError};

    struct ReverseRouting;

    impl CustomRouting for ReverseRouting {
        fn route(&self, task_index: usize, _task_count: usize, member_count: usize) -> usize {
            member_count - 1 - (task_index % member_count)
        }

        fn name(&self) -> &str {
            "Reverse"
        }
    }

    struct BrokenRouting;

    impl CustomRouting for BrokenRouting {
        fn route(&self, _task_index: usize, _task_count: usize, member_count: usize) -> usize {
            member_count
        }

        fn name(&self) -> &str {
            "Broken"
        }
    }

    #[test]
    fn test_round_robin_strategy() {
        let routes = RoundRobinRouting::new().assign(10, 4).unwrap();
        assert_eq!(routes, vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn test_round_robin_is_deterministic_across_runs() {
        let first = RoundRobinRouting::new().assign(10, 4).unwrap();
        for _ in 0..5 {
            assert_eq!(RoundRobinRouting::new().assign(10, 4).unwrap(), first);
        }
    }

    #[test]
    fn test_round_robin_strategy_no_members() {
        let err = RoundRobinRouting::new().assign(3, 0).unwrap_err();
        assert!(matches!(err, GroupError::Partitioning(_)));
        assert!(RoundRobinRouting::new().assign(0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_random_strategy_is_permutation_of_round_robin() {
        let mut routes = RandomRouting::new().assign(10, 4).unwrap();
        routes.sort_unstable();
        let mut expected = RoundRobinRouting::new().assign(10, 4).unwrap();
        expected.sort_unstable();
        assert_eq!(routes, expected);
    }

    #[test]
    fn test_custom_strategy() {
        let custom: Arc<dyn CustomRouting> = Arc::new(ReverseRouting);
        let strategy = routing_for(DispatchMode::Custom, Some(&custom)).unwrap();
        assert_eq!(strategy.name(), "Reverse");
        assert_eq!(strategy.assign(4, 3).unwrap(), vec![2, 1, 0, 2]);
    }

    #[test]
    fn test_custom_strategy_out_of_range() {
        let custom: Arc<dyn CustomRouting> = Arc::new(BrokenRouting);
        let strategy = routing_for(DispatchMode::Custom, Some(&custom)).unwrap();
        let err = strategy.assign(2, 2).unwrap_err();
        assert!(matches!(err, GroupError::Partitioning(_)));
    }

    #[test]
    fn test_custom_mode_requires_strategy() {
        assert!(routing_for(DispatchMode::Custom, None).is_err());
        assert_eq!(
            routing_for(DispatchMode::Dynamic, None).unwrap().name(),
            "RoundRobin"
        );
        assert_eq!(
            routing_for(DispatchMode::StaticRandom, None).unwrap().name(),
            "Random"
        );
    }
}

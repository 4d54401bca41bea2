//! 调用分区
//!
//! 把一次逻辑调用展开为若干成员任务。没有切分参数时为广播，任务数等于成员数，
//! 每个任务携带相同的参数；存在切分参数时任务数等于最长切分数组的长度，任务 i
//! 取每个切分数组的第 `i mod 长度` 个元素，非切分参数原样共享。

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use groupcall_core::{
    CustomRouting, DispatchMode, GroupError, GroupResult, Invocation, Payload, Task,
};

use crate::strategies::routing_for;

/// 分区时生效的设置，已合并组配置与单次调用覆盖
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PartitionSettings {
    pub mode: DispatchMode,
    /// 为真时所有数组参数都视为切分参数
    pub scatter: bool,
    pub unique_serialization: bool,
}

/// 分区结果
#[derive(Debug)]
pub struct Partition {
    pub tasks: Vec<Task>,
    pub scatter: bool,
}

#[derive(Default)]
pub struct CallPartitioner {
    custom: Option<Arc<dyn CustomRouting>>,
}

impl CallPartitioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_custom_routing(mut self, routing: Arc<dyn CustomRouting>) -> Self {
        self.custom = Some(routing);
        self
    }

    pub fn set_custom_routing(&mut self, routing: Option<Arc<dyn CustomRouting>>) {
        self.custom = routing;
    }

    pub fn partition(
        &self,
        invocation: &Invocation,
        member_count: usize,
        settings: &PartitionSettings,
    ) -> GroupResult<Partition> {
        let scattered = scattered_arguments(invocation, settings.scatter)?;
        let scatter = !scattered.is_empty();

        let task_count = if scatter {
            scattered.iter().map(|(_, items)| items.len()).max().unwrap_or(0)
        } else {
            member_count
        };

        let routing = routing_for(settings.mode, self.custom.as_ref())?;
        let routes = routing.assign(task_count, member_count)?;
        let method: Arc<str> = Arc::from(invocation.method.as_str());
        let dynamic = settings.mode.is_dynamic();

        let payloads = if scatter {
            scatter_payloads(invocation, &scattered, task_count)
        } else {
            let values: Vec<Value> = invocation
                .arguments
                .iter()
                .map(|argument| argument.value.clone())
                .collect();
            let shared = if settings.unique_serialization {
                Payload::serialize_once(&values)?
            } else {
                Payload::values(values)
            };
            vec![shared; task_count]
        };

        let tasks = payloads
            .into_iter()
            .zip(routes)
            .enumerate()
            .map(|(slot, (payload, member))| Task {
                slot,
                member,
                method: Arc::clone(&method),
                kind: invocation.kind,
                payload,
                dynamic,
            })
            .collect::<Vec<_>>();

        debug!(
            "调用 {} 分区完成: {} 个任务, 路由策略 {}, 切分: {}",
            invocation.method,
            tasks.len(),
            routing.name(),
            scatter
        );

        Ok(Partition { tasks, scatter })
    }
}

/// 收集切分参数（参数下标与元素列表）
fn scattered_arguments(
    invocation: &Invocation,
    scatter_arrays: bool,
) -> GroupResult<Vec<(usize, &[Value])>> {
    let mut scattered = Vec::new();
    for (position, argument) in invocation.arguments.iter().enumerate() {
        let is_scatter = argument.scatter || (scatter_arrays && argument.value.is_array());
        if !is_scatter {
            continue;
        }
        let items = argument.value.as_array().ok_or_else(|| {
            GroupError::partitioning(format!("第 {position} 个切分参数不是数组"))
        })?;
        if items.is_empty() {
            return Err(GroupError::partitioning(format!(
                "第 {position} 个切分参数为空数组"
            )));
        }
        scattered.push((position, items.as_slice()));
    }
    Ok(scattered)
}

fn scatter_payloads(
    invocation: &Invocation,
    scattered: &[(usize, &[Value])],
    task_count: usize,
) -> Vec<Payload> {
    (0..task_count)
        .map(|i| {
            let values = invocation
                .arguments
                .iter()
                .enumerate()
                .map(|(position, argument)| {
                    match scattered.iter().find(|(p, _)| *p == position) {
                        Some((_, items)) => items[i % items.len()].clone(),
                        None => argument.value.clone(),
                    }
                })
                .collect();
            Payload::values(values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupcall_core::{Argument, CallKind};
    use serde_json::json;

    fn args_of(task: &Task) -> Vec<Value> {
        task.payload.arguments().unwrap().into_owned()
    }

    #[test]
    fn test_broadcast_generates_one_task_per_member() {
        let invocation = Invocation::value("render")
            .with_argument(json!({"scene": 1}))
            .with_argument(json!("hd"));
        let partition = CallPartitioner::new()
            .partition(&invocation, 5, &PartitionSettings::default())
            .unwrap();

        assert!(!partition.scatter);
        assert_eq!(partition.tasks.len(), 5);
        for (i, task) in partition.tasks.iter().enumerate() {
            assert_eq!(task.slot, i);
            assert_eq!(task.member, i);
            assert_eq!(task.kind, CallKind::Value);
            assert_eq!(args_of(task), vec![json!({"scene": 1}), json!("hd")]);
            assert!(!task.dynamic);
        }
    }

    #[test]
    fn test_scatter_generates_one_task_per_element() {
        let invocation = Invocation::value("solve")
            .with_argument(Argument::scatter(vec![json!(10), json!(20), json!(30)]))
            .with_argument(json!("shared"));
        let partition = CallPartitioner::new()
            .partition(&invocation, 2, &PartitionSettings::default())
            .unwrap();

        assert!(partition.scatter);
        assert_eq!(partition.tasks.len(), 3);
        assert_eq!(args_of(&partition.tasks[0]), vec![json!(10), json!("shared")]);
        assert_eq!(args_of(&partition.tasks[1]), vec![json!(20), json!("shared")]);
        assert_eq!(args_of(&partition.tasks[2]), vec![json!(30), json!("shared")]);
        let members: Vec<_> = partition.tasks.iter().map(|t| t.member).collect();
        assert_eq!(members, vec![0, 1, 0]);
    }

    #[test]
    fn test_scatter_uses_longest_argument_and_wraps_shorter_ones() {
        let invocation = Invocation::void("pair")
            .with_argument(Argument::scatter(vec![json!("a"), json!("b")]))
            .with_argument(Argument::scatter(vec![
                json!(1),
                json!(2),
                json!(3),
                json!(4),
                json!(5),
            ]));
        let partition = CallPartitioner::new()
            .partition(&invocation, 3, &PartitionSettings::default())
            .unwrap();

        assert_eq!(partition.tasks.len(), 5);
        assert_eq!(args_of(&partition.tasks[4]), vec![json!("a"), json!(5)]);
        assert_eq!(args_of(&partition.tasks[3]), vec![json!("b"), json!(4)]);
    }

    #[test]
    fn test_group_scatter_flag_promotes_arrays() {
        let invocation = Invocation::value("sum")
            .with_argument(json!([1, 2]))
            .with_argument(json!(7));
        let settings = PartitionSettings {
            scatter: true,
            ..PartitionSettings::default()
        };
        let partition = CallPartitioner::new()
            .partition(&invocation, 4, &settings)
            .unwrap();

        assert_eq!(partition.tasks.len(), 2);
        assert_eq!(args_of(&partition.tasks[1]), vec![json!(2), json!(7)]);
    }

    #[test]
    fn test_invalid_scatter_arguments() {
        let not_array = Invocation::value("x").with_argument(Argument {
            value: json!(3),
            scatter: true,
        });
        let err = CallPartitioner::new()
            .partition(&not_array, 2, &PartitionSettings::default())
            .unwrap_err();
        assert!(matches!(err, GroupError::Partitioning(_)));

        let empty = Invocation::value("x").with_argument(Argument::scatter(vec![]));
        assert!(CallPartitioner::new()
            .partition(&empty, 2, &PartitionSettings::default())
            .is_err());
    }

    #[test]
    fn test_scatter_on_empty_group_fails() {
        let invocation =
            Invocation::value("x").with_argument(Argument::scatter(vec![json!(1)]));
        let err = CallPartitioner::new()
            .partition(&invocation, 0, &PartitionSettings::default())
            .unwrap_err();
        assert!(matches!(err, GroupError::Partitioning(_)));
    }

    #[test]
    fn test_dynamic_mode_tags_tasks() {
        let settings = PartitionSettings {
            mode: DispatchMode::Dynamic,
            ..PartitionSettings::default()
        };
        let partition = CallPartitioner::new()
            .partition(&Invocation::void("tick"), 3, &settings)
            .unwrap();
        assert!(partition.tasks.iter().all(|task| task.dynamic));
    }

    #[test]
    fn test_unique_serialization_shares_one_buffer() {
        let settings = PartitionSettings {
            unique_serialization: true,
            ..PartitionSettings::default()
        };
        let invocation = Invocation::value("load").with_argument(json!({"big": [1, 2, 3]}));
        let partition = CallPartitioner::new()
            .partition(&invocation, 3, &settings)
            .unwrap();

        let first = &partition.tasks[0].payload;
        assert!(first.is_serialized());
        assert!(partition
            .tasks
            .iter()
            .all(|task| task.payload.shares_storage_with(first)));
        assert_eq!(args_of(&partition.tasks[2]), vec![json!({"big": [1, 2, 3]})]);
    }
}

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use groupcall_core::{
    AppConfig, DispatchMode, GroupError, Invocation, InvocationFailure, Invoker, MemberCall,
    Outcome, TargetRef,
};
use groupcall_group::{Group, GroupHandle, Reply};

/// 进程内模拟成员的调用器
///
/// 每个成员按下标模拟不同的处理耗时，下标在失败列表中的成员总是返回错误。
pub struct SimulatedInvoker {
    failing: HashSet<String>,
}

impl SimulatedInvoker {
    pub fn new(failing: &[usize]) -> Self {
        Self {
            failing: failing.iter().map(|index| member_id(*index)).collect(),
        }
    }
}

fn member_id(index: usize) -> String {
    format!("member-{index}")
}

#[async_trait]
impl Invoker for SimulatedInvoker {
    async fn invoke(&self, target: &TargetRef, call: &MemberCall) -> Result<Value, InvocationFailure> {
        let delay = target.id.len() as u64 % 7 * 3;
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if self.failing.contains(&target.id) {
            return Err(InvocationFailure::application(format!(
                "{} 拒绝执行 {}",
                target.id, call.method
            )));
        }

        let args = call
            .payload
            .arguments()
            .map_err(|e| InvocationFailure::transport(e.to_string()))?;
        let result = match (&*call.method, args.first()) {
            ("square", Some(Value::Number(n))) => {
                let n = n.as_i64().unwrap_or_default();
                json!(n * n)
            }
            _ => json!({ "member": target.id, "method": &*call.method }),
        };
        Ok(result)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// 演示应用：对模拟成员依次执行广播、切分和无返回值调用
pub struct Application {
    handle: GroupHandle,
    member_count: usize,
}

impl Application {
    pub fn new(config: AppConfig, member_count: usize, failing: &[usize]) -> Self {
        let invoker = Arc::new(SimulatedInvoker::new(failing));
        let group = Group::from_targets((0..member_count).map(|i| TargetRef::remote(member_id(i))));
        info!(
            "初始化组 {}: {} 个成员, 分派模式 {}",
            config.group.name,
            member_count,
            config.group.dispatch_mode.as_str()
        );
        Self {
            handle: GroupHandle::new(&config, invoker).with_group(group),
            member_count,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let reply = self
            .handle
            .reify(Invocation::value("status"))
            .await
            .context("广播调用失败")?;
        print_reply("status", reply);

        let inputs: Vec<Value> = (0..self.member_count as i64 * 2).map(|i| json!(i)).collect();
        let reply = self
            .handle
            .reify(
                Invocation::value("square")
                    .with_argument(groupcall_core::Argument::scatter(inputs))
                    .with_dispatch_mode(DispatchMode::Dynamic),
            )
            .await
            .context("切分调用失败")?;
        print_reply("square", reply);
        if let Some(report) = self.handle.last_report() {
            println!("{}", serde_json::to_string_pretty(report)?);
        }

        match self.handle.reify(Invocation::void("refresh")).await {
            Ok(_) => info!("refresh 调用完成"),
            Err(GroupError::Aggregate(failure)) => {
                warn!("refresh 调用有 {} 个成员失败", failure.len());
                for record in failure.records() {
                    println!("  member {} -> {}", record.member_index, record.failure);
                }
            }
            Err(e) => return Err(e).context("refresh 调用失败"),
        }

        println!("{}", self.handle.group());
        Ok(())
    }
}

fn print_reply(method: &str, reply: Reply) {
    match reply {
        Reply::Results(results) => {
            println!("{method}: {} 个结果", results.len());
            for (index, outcome) in results.outcomes().into_iter().enumerate() {
                match outcome {
                    Some(Outcome::Value(value)) => println!("  [{index}] {value}"),
                    Some(Outcome::Skipped) => println!("  [{index}] 已跳过"),
                    Some(Outcome::Failed(failure)) => println!("  [{index}] 失败: {failure}"),
                    None => println!("  [{index}] 等待中"),
                }
            }
        }
        Reply::Identity(value) => println!("{method}: {value}"),
        Reply::Completed => println!("{method}: 完成"),
    }
}

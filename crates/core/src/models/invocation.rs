use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{GroupError, GroupResult};

/// 调用类型，显式标记替代返回类型的运行时探测
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// 单向调用，不关心结果
    OneWay,
    /// 无返回值但需要感知异常
    Void,
    /// 有返回值，结果汇总为结果组
    Value,
}

impl CallKind {
    pub fn returns_value(&self) -> bool {
        matches!(self, CallKind::Value)
    }
}

/// 任务到成员的分派模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// 未指定，按静态轮询处理
    #[default]
    Unspecified,
    StaticRoundRobin,
    StaticRandom,
    Dynamic,
    Custom,
}

impl DispatchMode {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, DispatchMode::Dynamic)
    }
    /// 需要构建负载监视器的模式
    pub fn needs_load_monitor(&self) -> bool {
        matches!(self, DispatchMode::Dynamic | DispatchMode::StaticRandom)
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Unspecified => "unspecified",
            DispatchMode::StaticRoundRobin => "static_round_robin",
            DispatchMode::StaticRandom => "static_random",
            DispatchMode::Dynamic => "dynamic",
            DispatchMode::Custom => "custom",
        }
    }
}

impl std::str::FromStr for DispatchMode {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unspecified" | "" => Ok(DispatchMode::Unspecified),
            "static_round_robin" | "round_robin" => Ok(DispatchMode::StaticRoundRobin),
            "static_random" | "random" => Ok(DispatchMode::StaticRandom),
            "dynamic" => Ok(DispatchMode::Dynamic),
            "custom" => Ok(DispatchMode::Custom),
            _ => Err(GroupError::config_error(format!("无效的分派模式: {s}"))),
        }
    }
}

/// 调用参数
///
/// `scatter` 为真时参数必须是数组，数组元素被切分给各个任务；否则整体广播。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub value: Value,
    pub scatter: bool,
}

impl Argument {
    pub fn shared(value: Value) -> Self {
        Self {
            value,
            scatter: false,
        }
    }
    pub fn scatter(values: Vec<Value>) -> Self {
        Self {
            value: Value::Array(values),
            scatter: true,
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::shared(value)
    }
}

/// 单次调用的配置覆盖，在调用边界解析
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    pub dispatch_mode: Option<DispatchMode>,
    pub scatter: Option<bool>,
    pub buffer_size: Option<usize>,
}

/// 由组自身在本地回答的身份类操作
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityOp {
    ToString,
    HashCode,
    Equals(Value),
}

/// 一次逻辑调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub method: String,
    pub arguments: Vec<Argument>,
    pub kind: CallKind,
    #[serde(default)]
    pub options: CallOptions,
}

impl Invocation {
    pub fn new<S: Into<String>>(method: S, kind: CallKind) -> Self {
        Self {
            method: method.into(),
            arguments: Vec::new(),
            kind,
            options: CallOptions::default(),
        }
    }
    pub fn one_way<S: Into<String>>(method: S) -> Self {
        Self::new(method, CallKind::OneWay)
    }
    pub fn void<S: Into<String>>(method: S) -> Self {
        Self::new(method, CallKind::Void)
    }
    pub fn value<S: Into<String>>(method: S) -> Self {
        Self::new(method, CallKind::Value)
    }
    pub fn with_argument(mut self, argument: impl Into<Argument>) -> Self {
        self.arguments.push(argument.into());
        self
    }
    pub fn with_arguments(mut self, arguments: Vec<Argument>) -> Self {
        self.arguments = arguments;
        self
    }
    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.options.dispatch_mode = Some(mode);
        self
    }
    pub fn with_scatter(mut self, scatter: bool) -> Self {
        self.options.scatter = Some(scatter);
        self
    }
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.options.buffer_size = Some(buffer_size);
        self
    }

    /// 判断调用是否为身份类操作（字符串形式、哈希、相等比较）
    pub fn identity_op(&self) -> Option<IdentityOp> {
        match (self.method.as_str(), self.arguments.len()) {
            ("to_string", 0) => Some(IdentityOp::ToString),
            ("hash_code", 0) => Some(IdentityOp::HashCode),
            ("equals", 1) => Some(IdentityOp::Equals(self.arguments[0].value.clone())),
            _ => None,
        }
    }
}

/// 发送给调用器的参数载荷
#[derive(Debug, Clone)]
pub enum Payload {
    /// 参数值，多个任务之间共享
    Values(Arc<Vec<Value>>),
    /// 广播参数只序列化一次后共享的字节
    Serialized(Arc<[u8]>),
}

impl Payload {
    pub fn values(values: Vec<Value>) -> Self {
        Payload::Values(Arc::new(values))
    }

    /// 将参数整体序列化一次
    pub fn serialize_once(values: &[Value]) -> GroupResult<Self> {
        let bytes = serde_json::to_vec(values)?;
        Ok(Payload::Serialized(Arc::from(bytes)))
    }

    /// 取得参数值；序列化形式会在这里解码
    pub fn arguments(&self) -> GroupResult<Cow<'_, [Value]>> {
        match self {
            Payload::Values(values) => Ok(Cow::Borrowed(values.as_slice())),
            Payload::Serialized(bytes) => {
                let values: Vec<Value> = serde_json::from_slice(bytes)?;
                Ok(Cow::Owned(values))
            }
        }
    }

    /// 为本地目标生成一份不与其他任务共享的参数副本
    pub fn defensive_copy(&self) -> GroupResult<Self> {
        let values = self.arguments()?.into_owned();
        Ok(Payload::values(values))
    }

    pub fn is_serialized(&self) -> bool {
        matches!(self, Payload::Serialized(_))
    }

    /// 判断两个载荷是否共享同一块内存
    pub fn shares_storage_with(&self, other: &Payload) -> bool {
        match (self, other) {
            (Payload::Values(a), Payload::Values(b)) => Arc::ptr_eq(a, b),
            (Payload::Serialized(a), Payload::Serialized(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// 发往单个成员的调用
#[derive(Debug, Clone)]
pub struct MemberCall {
    pub method: Arc<str>,
    pub kind: CallKind,
    pub payload: Payload,
}

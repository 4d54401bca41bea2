pub mod invoker;
pub mod member_factory;
pub mod routing;

pub use invoker::Invoker;
pub use member_factory::MemberFactory;
pub use routing::CustomRouting;

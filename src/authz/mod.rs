pub mod abac;
pub mod roles;
pub mod session;

pub use abac::{AbacEvaluator, AccessCondition, AccessRule, ConditionType, Context as AbacContext, Effect, Operator};
pub use roles::{allow_action, Action};
pub use session::{Session, SessionManager};

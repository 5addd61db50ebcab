pub mod identity;
pub mod policy;
pub mod secret;

pub use identity::{Identity, Role};
pub use policy::Policy;
pub use secret::{RotationHandlerId, Secret, SecretVersion};

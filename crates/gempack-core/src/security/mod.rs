//! Extraction safety and verification policy.

pub mod path;
pub mod permissions;
pub mod policy;

pub use path::install_location;
pub use permissions::apply_mode;
pub use policy::Check;
pub use policy::ParsePolicyError;
pub use policy::SecurityPolicy;

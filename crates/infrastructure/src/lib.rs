//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_notification_service;
mod in_memory_directory;
mod in_memory_resource_authority;
mod yaml_policy_source;

pub use console_notification_service::ConsoleNotificationService;
pub use in_memory_directory::InMemoryDirectory;
pub use in_memory_resource_authority::InMemoryResourceAuthority;
pub use yaml_policy_source::YamlPolicySource;

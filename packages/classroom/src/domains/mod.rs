//! Business domains. Each domain owns its actions, edges and authorization
//! rules; shared machinery (entity model, repository, saga) lives above.

pub mod classroom;

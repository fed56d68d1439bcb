//! Skills system: filesystem-scoped CRUD over `SKILL.md` bundles.

mod manager;

pub use manager::{validate_skill_name, SkillBundle, SkillManager};

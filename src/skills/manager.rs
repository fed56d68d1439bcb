//! Skill manager: filesystem-scoped CRUD over skill bundles.
//!
//! Full create/update/delete/save-asset operations over frontmatter-between-
//! `---`-delimiters `SKILL.md` files, backed by a `DashMap` read cache
//! invalidated on every mutation. Every filesystem-targeting call
//! re-validates the skill name and, for asset writes, the relative path,
//! never trusting a prior validation from the same request.

use std::path::{Component, Path, PathBuf};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Mapping;

use crate::error::{GatewayError, Result};

const MAX_NAME_LEN: usize = 64;
const ASSET_DIRS: [&str; 3] = ["scripts", "references", "assets"];

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));

/// A loaded skill bundle: parsed frontmatter, markdown body, and the
/// relative paths of every asset file under `scripts/`, `references/`, or
/// `assets/` (never `SKILL.md` itself).
#[derive(Debug, Clone)]
pub struct SkillBundle {
    pub name: String,
    pub frontmatter: Mapping,
    pub body: String,
    pub assets: Vec<String>,
}

impl SkillBundle {
    pub fn description(&self) -> String {
        self.frontmatter
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

/// Validate a skill name against `^[a-z0-9]([-a-z0-9]*[a-z0-9])?$`, length
/// <= 64, and no consecutive hyphens. Re-run on every filesystem-targeting
/// operation, never trusted from a prior call.
pub fn validate_skill_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(GatewayError::InvalidSkillName(format!(
            "'{name}' must be 1-{MAX_NAME_LEN} characters"
        )));
    }
    if name.contains("--") {
        return Err(GatewayError::InvalidSkillName(format!(
            "'{name}' must not contain consecutive hyphens"
        )));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(GatewayError::InvalidSkillName(format!(
            "'{name}' does not match ^[a-z0-9]([-a-z0-9]*[a-z0-9])?$"
        )));
    }
    Ok(())
}

/// Resolve `rel_path` against `root`, rejecting anything that is absolute,
/// contains a `..` component, or contains a literal backslash (Windows
/// traversal on a Unix host bypasses `Path` component parsing). The
/// resulting path is guaranteed to stay under `root`.
fn secure_relative_path(root: &Path, rel_path: &str) -> Result<PathBuf> {
    if rel_path.contains('\\') {
        return Err(GatewayError::InvalidAssetPath(format!(
            "'{rel_path}' contains a backslash"
        )));
    }
    let candidate = Path::new(rel_path);
    if candidate.is_absolute() {
        return Err(GatewayError::InvalidAssetPath(format!(
            "'{rel_path}' is an absolute path"
        )));
    }
    for component in candidate.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                crate::audit::log_audit_event(
                    crate::audit::AuditCategory::PathSecurity,
                    crate::audit::AuditSeverity::Critical,
                    "asset_path_traversal",
                    &format!("'{rel_path}' escapes the skill root"),
                    true,
                );
                return Err(GatewayError::InvalidAssetPath(format!(
                    "'{rel_path}' escapes the skill root"
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(GatewayError::InvalidAssetPath(format!(
                    "'{rel_path}' is an absolute path"
                )));
            }
        }
    }
    Ok(root.join(candidate))
}

fn render_frontmatter(frontmatter: &Mapping, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(frontmatter)?;
    Ok(format!("---\n{yaml}---\n\n{body}"))
}

fn parse_skill_md(raw: &str) -> Result<(Mapping, String)> {
    let re = Regex::new(r"(?s)^---\n(.*?)\n---\n?").expect("valid regex");
    let captures = re.captures(raw).ok_or_else(|| {
        GatewayError::PersistenceFailure("SKILL.md missing required YAML frontmatter".to_string())
    })?;
    let frontmatter_src = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let body_start = captures.get(0).map(|m| m.end()).unwrap_or(0);
    let frontmatter: Mapping = serde_yaml::from_str(frontmatter_src)?;
    Ok((frontmatter, raw[body_start..].trim().to_string()))
}

/// Manages skill directories under a single root: `<root>/<name>/SKILL.md`
/// plus optional `scripts/`, `references/`, `assets/` subdirectories.
pub struct SkillManager {
    root: PathBuf,
    cache: DashMap<String, SkillBundle>,
}

impl SkillManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: DashMap::new(),
        }
    }

    fn skill_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Create a new skill. Fails if the name is invalid or the directory
    /// already exists; pre-creates the three asset subdirectories.
    pub fn create(&self, name: &str, frontmatter: Mapping, body: &str) -> Result<()> {
        validate_skill_name(name)?;
        let dir = self.skill_dir(name);
        if dir.exists() {
            return Err(GatewayError::Conflict(format!("skill '{name}' already exists")));
        }

        std::fs::create_dir_all(&dir)?;
        for asset_dir in ASSET_DIRS {
            std::fs::create_dir_all(dir.join(asset_dir))?;
        }
        std::fs::write(dir.join("SKILL.md"), render_frontmatter(&frontmatter, body)?)?;

        self.cache.remove(name);
        Ok(())
    }

    /// Update a skill in place, optionally renaming it. On rename, the
    /// destination directory must not already exist; the move is atomic via
    /// `fs::rename`.
    pub fn update(
        &self,
        old_name: &str,
        new_name: &str,
        frontmatter: Mapping,
        body: &str,
    ) -> Result<()> {
        validate_skill_name(old_name)?;
        validate_skill_name(new_name)?;

        let old_dir = self.skill_dir(old_name);
        if !old_dir.is_dir() {
            return Err(GatewayError::NotFound(format!("skill '{old_name}' not found")));
        }

        let dir = if old_name != new_name {
            let new_dir = self.skill_dir(new_name);
            if new_dir.exists() {
                return Err(GatewayError::Conflict(format!(
                    "skill '{new_name}' already exists"
                )));
            }
            std::fs::rename(&old_dir, &new_dir)?;
            new_dir
        } else {
            old_dir
        };

        std::fs::write(dir.join("SKILL.md"), render_frontmatter(&frontmatter, body)?)?;

        self.cache.remove(old_name);
        self.cache.remove(new_name);
        Ok(())
    }

    /// Recursively remove a skill's directory.
    pub fn delete(&self, name: &str) -> Result<()> {
        validate_skill_name(name)?;
        let dir = self.skill_dir(name);
        if !dir.is_dir() {
            return Err(GatewayError::NotFound(format!("skill '{name}' not found")));
        }
        std::fs::remove_dir_all(&dir)?;
        self.cache.remove(name);
        Ok(())
    }

    /// Write an asset file under a skill directory. Re-validates
    /// `skill_name` (never trusts a caller's prior validation) and enforces
    /// path containment on `rel_path` before touching the filesystem.
    pub fn save_asset(&self, skill_name: &str, rel_path: &str, bytes: &[u8]) -> Result<()> {
        validate_skill_name(skill_name)?;
        let dir = self.skill_dir(skill_name);
        if !dir.is_dir() {
            return Err(GatewayError::NotFound(format!(
                "skill '{skill_name}' not found"
            )));
        }

        let target = secure_relative_path(&dir, rel_path)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, bytes)?;

        self.cache.remove(skill_name);
        Ok(())
    }

    /// List every skill name with a `SKILL.md` under the root, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() && path.join("SKILL.md").is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load one skill, serving the cache when present.
    pub fn get(&self, name: &str) -> Result<SkillBundle> {
        validate_skill_name(name)?;
        if let Some(cached) = self.cache.get(name) {
            return Ok(cached.clone());
        }

        let dir = self.skill_dir(name);
        let skill_md = dir.join("SKILL.md");
        if !skill_md.is_file() {
            return Err(GatewayError::NotFound(format!("skill '{name}' not found")));
        }

        let raw = std::fs::read_to_string(&skill_md)?;
        let (frontmatter, body) = parse_skill_md(&raw)?;
        let assets = self.walk_assets(&dir)?;

        let bundle = SkillBundle {
            name: name.to_string(),
            frontmatter,
            body,
            assets,
        };
        self.cache.insert(name.to_string(), bundle.clone());
        Ok(bundle)
    }

    fn walk_assets(&self, dir: &Path) -> Result<Vec<String>> {
        let mut assets = Vec::new();
        for asset_dir in ASSET_DIRS {
            let sub = dir.join(asset_dir);
            if !sub.is_dir() {
                continue;
            }
            collect_files(&sub, dir, &mut assets)?;
        }
        assets.sort();
        Ok(assets)
    }
}

fn collect_files(dir: &Path, root: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, root, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &str)]) -> Mapping {
        let mut m = Mapping::new();
        for (k, v) in pairs {
            m.insert((*k).into(), (*v).into());
        }
        m
    }

    #[test]
    fn valid_names_accepted() {
        assert!(validate_skill_name("my-skill").is_ok());
        assert!(validate_skill_name("a").is_ok());
        assert!(validate_skill_name("a1-b2").is_ok());
    }

    #[test]
    fn invalid_names_rejected() {
        assert!(validate_skill_name("").is_err());
        assert!(validate_skill_name("My-Skill").is_err());
        assert!(validate_skill_name("-leading").is_err());
        assert!(validate_skill_name("trailing-").is_err());
        assert!(validate_skill_name("a--b").is_err());
        assert!(validate_skill_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn create_save_asset_and_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SkillManager::new(dir.path());

        manager
            .create("my-skill", mapping(&[("name", "my-skill"), ("description", "demo")]), "# Body")
            .unwrap();
        manager
            .save_asset("my-skill", "scripts/t.py", b"print(1)")
            .unwrap();

        let skill = manager.get("my-skill").unwrap();
        assert!(skill.assets.contains(&"scripts/t.py".to_string()));
        assert_eq!(skill.description(), "demo");

        let err = manager.save_asset("my-skill", "../evil", b"x").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidAssetPath(_)));
        assert!(!dir.path().join("evil").exists());
    }

    #[test]
    fn path_traversal_rejected_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SkillManager::new(dir.path());
        manager.create("s", Mapping::new(), "body").unwrap();

        assert!(manager.save_asset("s", "../x", b"y").is_err());
        assert!(manager.save_asset("..", "x", b"y").is_err());
        assert!(manager.delete("../y").is_err());
        assert!(manager.get("..").is_err());
        assert!(!dir.path().parent().unwrap().join("x").exists());
        assert!(!dir.path().parent().unwrap().join("y").exists());
    }

    #[test]
    fn create_twice_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SkillManager::new(dir.path());
        manager.create("s", Mapping::new(), "body").unwrap();
        let err = manager.create("s", Mapping::new(), "body").unwrap_err();
        assert!(matches!(err, GatewayError::Conflict(_)));
    }

    #[test]
    fn update_renames_directory_and_invalidates_both_cache_entries() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SkillManager::new(dir.path());
        manager
            .create("old-name", mapping(&[("description", "v1")]), "body")
            .unwrap();
        manager.get("old-name").unwrap();

        manager
            .update("old-name", "new-name", mapping(&[("description", "v2")]), "body2")
            .unwrap();

        assert!(manager.get("old-name").is_err());
        let renamed = manager.get("new-name").unwrap();
        assert_eq!(renamed.description(), "v2");
        assert_eq!(renamed.body, "body2");
    }

    #[test]
    fn update_rename_conflict_leaves_original_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SkillManager::new(dir.path());
        manager.create("a", Mapping::new(), "body-a").unwrap();
        manager.create("b", Mapping::new(), "body-b").unwrap();

        let err = manager.update("a", "b", Mapping::new(), "x").unwrap_err();
        assert!(matches!(err, GatewayError::Conflict(_)));
        assert_eq!(manager.get("a").unwrap().body, "body-a");
    }

    #[test]
    fn delete_removes_directory_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SkillManager::new(dir.path());
        manager.create("s", Mapping::new(), "body").unwrap();
        manager.get("s").unwrap();

        manager.delete("s").unwrap();
        assert!(!dir.path().join("s").exists());
        assert!(manager.get("s").is_err());
    }

    #[test]
    fn list_sorted_and_excludes_non_skill_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SkillManager::new(dir.path());
        manager.create("zeta", Mapping::new(), "body").unwrap();
        manager.create("alpha", Mapping::new(), "body").unwrap();
        std::fs::create_dir_all(dir.path().join("not-a-skill")).unwrap();

        let names = manager.list().unwrap();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn missing_root_list_is_empty_not_error() {
        let manager = SkillManager::new("/definitely/does/not/exist/xyz");
        assert!(manager.list().unwrap().is_empty());
    }

    #[test]
    fn cache_is_invalidated_on_save_asset() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SkillManager::new(dir.path());
        manager.create("s", Mapping::new(), "body").unwrap();
        manager.get("s").unwrap();
        assert!(manager.get("s").unwrap().assets.is_empty());

        manager.save_asset("s", "assets/img.png", b"\x89PNG").unwrap();
        let refreshed = manager.get("s").unwrap();
        assert_eq!(refreshed.assets, vec!["assets/img.png".to_string()]);
    }
}

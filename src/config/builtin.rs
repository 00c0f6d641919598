//! Configuration tree shipped with the crate
//!
//! The AudioGen base 16 kHz solver and every fragment it pulls in through its
//! defaults list. Paths are relative to the tree root, without extension.

use crate::error::Result;
use std::fs;
use std::path::Path;

/// Solver selected when none is given on the command line
pub const DEFAULT_SOLVER: &str = "audiogen/audiogen_base_16khz";

/// Name of the root config
pub const ROOT_CONFIG: &str = "config";

const FRAGMENTS: &[(&str, &str)] = &[
    ("config", include_str!("../../conf/config.yaml")),
    ("dset/default", include_str!("../../conf/dset/default.yaml")),
    (
        "dset/audio/default",
        include_str!("../../conf/dset/audio/default.yaml"),
    ),
    ("solver/default", include_str!("../../conf/solver/default.yaml")),
    (
        "solver/audiogen/default",
        include_str!("../../conf/solver/audiogen/default.yaml"),
    ),
    (
        "solver/audiogen/audiogen_base_16khz",
        include_str!("../../conf/solver/audiogen/audiogen_base_16khz.yaml"),
    ),
    (
        "model/lm/audiogen_lm",
        include_str!("../../conf/model/lm/audiogen_lm.yaml"),
    ),
    (
        "model/lm/model_scale/small",
        include_str!("../../conf/model/lm/model_scale/small.yaml"),
    ),
    (
        "model/lm/model_scale/medium",
        include_str!("../../conf/model/lm/model_scale/medium.yaml"),
    ),
    (
        "model/lm/model_scale/large",
        include_str!("../../conf/model/lm/model_scale/large.yaml"),
    ),
];

/// All shipped fragments as `(path, yaml)` pairs
pub fn builtin_fragments() -> &'static [(&'static str, &'static str)] {
    FRAGMENTS
}

/// Write the shipped tree under `dir` so it can be edited and passed back
/// with `--config-dir`.
///
/// Existing files are left alone unless `force` is set. Returns the number
/// of files written.
pub fn write_builtin_tree(dir: &Path, force: bool) -> Result<usize> {
    let mut written = 0;
    for (name, content) in FRAGMENTS {
        let target = dir.join(format!("{name}.yaml"));
        if target.exists() && !force {
            tracing::debug!(path = %target.display(), "keeping existing file");
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, content)?;
        written += 1;
    }
    tracing::info!(dir = %dir.display(), files = written, "wrote config tree");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_fragment_parses() {
        for (name, content) in builtin_fragments() {
            let parsed: serde_yaml::Result<serde_yaml::Value> = serde_yaml::from_str(content);
            assert!(parsed.is_ok(), "{name} is not valid YAML");
        }
    }

    #[test]
    fn test_write_builtin_tree_respects_existing() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_builtin_tree(dir.path(), false).unwrap();
        assert_eq!(written, builtin_fragments().len());
        assert!(dir
            .path()
            .join("solver/audiogen/audiogen_base_16khz.yaml")
            .exists());

        fs::write(dir.path().join("config.yaml"), "seed: 7\n").unwrap();
        assert_eq!(write_builtin_tree(dir.path(), false).unwrap(), 0);
        assert_eq!(
            fs::read_to_string(dir.path().join("config.yaml")).unwrap(),
            "seed: 7\n"
        );

        assert_eq!(
            write_builtin_tree(dir.path(), true).unwrap(),
            builtin_fragments().len()
        );
    }
}

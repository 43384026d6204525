use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

/// Environment changes applied to a child process instead of to the launcher.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionContext {
    #[serde(serialize_with = "lossy_env")]
    pub env: BTreeMap<String, OsString>,
    pub removed: Vec<String>,
    pub path_prefixes: Vec<PathBuf>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `path_prefixes` to `base`. Fails when a prefix contains the
    /// platform path separator.
    pub fn merged_path(&self, base: Option<OsString>) -> Result<Option<OsString>, String> {
        if self.path_prefixes.is_empty() {
            return Ok(None);
        }

        let mut segments: Vec<PathBuf> = self.path_prefixes.clone();
        if let Some(existing) = base.filter(|p| !p.is_empty()) {
            segments.extend(std::env::split_paths(&existing));
        }

        std::env::join_paths(segments)
            .map(Some)
            .map_err(|err| err.to_string())
    }
}

/// Where the pieces of a virtual environment live on a given OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VenvLayout {
    pub bin_dir: &'static str,
    pub marker: &'static str,
    pub interpreters: &'static [&'static str],
}

impl VenvLayout {
    pub fn for_os(os: &str) -> Self {
        if os == "windows" {
            VenvLayout {
                bin_dir: "Scripts",
                marker: "activate.bat",
                interpreters: &["python.exe"],
            }
        } else {
            VenvLayout {
                bin_dir: "bin",
                marker: "activate",
                interpreters: &["python", "python3"],
            }
        }
    }

    pub fn marker_path(&self, venv_dir: &Path) -> PathBuf {
        venv_dir.join(self.bin_dir).join(self.marker)
    }
}

/// An activated virtual environment, ready to be handed to a child process.
#[derive(Debug, Clone, Serialize)]
pub struct ActivatedEnv {
    pub venv_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub interpreter: PathBuf,
    pub context: ExecutionContext,
}

impl ActivatedEnv {
    /// The PATH value the child will see.
    pub fn search_path(&self) -> Option<&OsStr> {
        self.context.env.get("PATH").map(OsString::as_os_str)
    }
}

/// Render values for display only; the child always receives the raw bytes.
fn lossy_env<S: Serializer>(env: &BTreeMap<String, OsString>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_map(env.iter().map(|(key, value)| (key, value.to_string_lossy())))
}

/// Reproduce what the venv activation script does, as data.
pub fn activate_venv(
    venv_dir: &Path,
    layout: VenvLayout,
    base_path: Option<OsString>,
) -> Result<ActivatedEnv, String> {
    let bin_dir = venv_dir.join(layout.bin_dir);
    if !bin_dir.is_dir() {
        return Err(format!("{} is not a directory", bin_dir.display()));
    }

    let interpreter = layout
        .interpreters
        .iter()
        .map(|name| bin_dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            format!(
                "no interpreter ({}) found in {}",
                layout.interpreters.join(", "),
                bin_dir.display()
            )
        })?;

    let mut ctx = ExecutionContext::new();
    ctx.env
        .insert("VIRTUAL_ENV".to_string(), venv_dir.as_os_str().to_owned());
    ctx.removed.push("PYTHONHOME".to_string());
    ctx.path_prefixes.push(bin_dir.clone());

    if let Some(path) = ctx.merged_path(base_path)? {
        ctx.env.insert("PATH".to_string(), path);
    }

    Ok(ActivatedEnv {
        venv_dir: venv_dir.to_path_buf(),
        bin_dir,
        interpreter,
        context: ctx,
    })
}

#[cfg(test)]
mod tests {
    use super::{ExecutionContext, VenvLayout, activate_venv};
    use std::ffi::OsString;
    use std::fs;
    use std::path::PathBuf;

    fn fake_venv(root: &std::path::Path, interpreter: &str) -> PathBuf {
        let venv = root.join("venv");
        fs::create_dir_all(venv.join("bin")).unwrap();
        fs::write(venv.join("bin").join("activate"), "").unwrap();
        fs::write(venv.join("bin").join(interpreter), "").unwrap();
        venv
    }

    #[test]
    fn layout_differs_per_os() {
        let win = VenvLayout::for_os("windows");
        assert_eq!(win.bin_dir, "Scripts");
        assert_eq!(
            win.marker_path(&PathBuf::from("venv")),
            PathBuf::from("venv").join("Scripts").join("activate.bat")
        );

        let unix = VenvLayout::for_os("linux");
        assert_eq!(unix.marker, "activate");
        assert_eq!(unix.interpreters, &["python", "python3"]);
    }

    #[test]
    fn activation_prepends_bin_dir_and_sets_virtual_env() {
        let dir = tempfile::tempdir().unwrap();
        let venv = fake_venv(dir.path(), "python");
        let base = std::env::join_paths([PathBuf::from("/usr/bin")]).unwrap();

        let env = activate_venv(&venv, VenvLayout::for_os("linux"), Some(base)).unwrap();

        assert_eq!(env.interpreter, venv.join("bin").join("python"));
        assert_eq!(
            env.context.env.get("VIRTUAL_ENV").map(OsString::as_os_str),
            Some(venv.as_os_str())
        );
        assert!(env.context.removed.contains(&"PYTHONHOME".to_string()));

        let path = env.search_path().expect("PATH is set");
        let first = std::env::split_paths(path).next().unwrap();
        assert_eq!(first, venv.join("bin"));
        assert!(std::env::split_paths(path).any(|p| p == PathBuf::from("/usr/bin")));
    }

    #[test]
    fn activation_falls_back_to_python3() {
        let dir = tempfile::tempdir().unwrap();
        let venv = fake_venv(dir.path(), "python3");

        let env = activate_venv(&venv, VenvLayout::for_os("linux"), None).unwrap();
        assert_eq!(env.interpreter, venv.join("bin").join("python3"));
    }

    #[test]
    fn activation_fails_without_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let venv = dir.path().join("venv");
        fs::create_dir_all(venv.join("bin")).unwrap();
        fs::write(venv.join("bin").join("activate"), "").unwrap();

        let err = activate_venv(&venv, VenvLayout::for_os("linux"), None).unwrap_err();
        assert!(err.contains("no interpreter"));
    }

    #[test]
    fn merged_path_without_prefixes_is_none() {
        let ctx = ExecutionContext::new();
        assert_eq!(ctx.merged_path(Some(OsString::from("/bin"))), Ok(None));
    }

    #[cfg(unix)]
    #[test]
    fn activation_keeps_non_utf8_project_paths_intact() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join(std::ffi::OsStr::from_bytes(b"pr\xffj"));
        let venv = fake_venv(&project, "python");

        let env = activate_venv(&venv, VenvLayout::for_os("linux"), None).unwrap();

        assert_eq!(
            env.context.env.get("VIRTUAL_ENV").map(OsString::as_os_str),
            Some(venv.as_os_str())
        );
        let path = env.search_path().expect("PATH is set");
        let first = std::env::split_paths(path).next().unwrap();
        assert_eq!(first, venv.join("bin"));
        assert!(first.is_dir());
    }
}

//! Launch descriptors and dependency providers
//!
//! A dependency provider answers one question: given a platform and the
//! user's per-language settings, what command line and environment start
//! this language server? Providers that download and cache a server binary
//! implement [`SinglePathProvider`]; providers that expect the executable on
//! PATH use [`find_in_path`]. The actual download/extract machinery lives
//! outside the core, behind [`CoreDependencyInstaller`].

use lantern_core::prelude::*;
use lantern_settings::LanguageSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Platform tag for dependency resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
  LinuxX64,
  LinuxArm64,
  MacX64,
  MacArm64,
  WinX64,
}

impl Platform {
  /// Detect the platform this process runs on
  pub fn current() -> Self {
    if cfg!(target_os = "windows") {
      Platform::WinX64
    } else if cfg!(target_os = "macos") {
      if cfg!(target_arch = "aarch64") {
        Platform::MacArm64
      } else {
        Platform::MacX64
      }
    } else if cfg!(target_arch = "aarch64") {
      Platform::LinuxArm64
    } else {
      Platform::LinuxX64
    }
  }

  pub fn is_windows(&self) -> bool {
    matches!(self, Platform::WinX64)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Platform::LinuxX64 => "linux-x64",
      Platform::LinuxArm64 => "linux-arm64",
      Platform::MacX64 => "osx-x64",
      Platform::MacArm64 => "osx-arm64",
      Platform::WinX64 => "win-x64",
    }
  }
}

/// Immutable description of how to start one language server.
///
/// `env` is an overlay merged onto the inherited environment: `Some(value)`
/// sets a variable (an empty string is a real value), `None` unsets an
/// inherited one.
#[derive(Debug, Clone)]
pub struct LaunchDescriptor {
  pub command: PathBuf,
  pub args: Vec<String>,
  pub cwd: PathBuf,
  pub env: Vec<(String, Option<String>)>,
  pub platform: Platform,
}

impl LaunchDescriptor {
  pub fn new(command: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
    Self {
      command: command.into(),
      args: Vec::new(),
      cwd: cwd.into(),
      env: Vec::new(),
      platform: Platform::current(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn env_set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.push((key.into(), Some(value.into())));
    self
  }

  pub fn env_unset(mut self, key: impl Into<String>) -> Self {
    self.env.push((key.into(), None));
    self
  }
}

/// Resolves the launch command + env for one language on one platform
pub trait DependencyProvider: Send + Sync {
  fn resolve(
    &self,
    root: &Path,
    platform: Platform,
    settings: &LanguageSettings,
  ) -> Result<LaunchDescriptor>;
}

/// Installs a downloaded core dependency into a destination directory.
///
/// Concrete implementations (archive download + extraction, `gem install`)
/// live outside the core.
pub trait CoreDependencyInstaller: Send + Sync {
  fn install(&self, url: &str, destination: &Path) -> Result<()>;
}

/// Skeleton for providers that manage a single downloaded executable,
/// cached under a resources directory keyed by server and version.
pub trait SinglePathProvider {
  /// Language this provider serves (for error messages)
  fn language_id(&self) -> &str;

  /// Where the executable must end up for this version
  fn executable_path(&self, resources_dir: &Path, platform: Platform) -> PathBuf;

  /// Download URL for this platform and version
  fn download_url(&self, platform: Platform) -> Result<String>;

  /// Resolve the executable, installing it on first use.
  fn get_or_install(
    &self,
    resources_dir: &Path,
    platform: Platform,
    installer: Option<&dyn CoreDependencyInstaller>,
  ) -> Result<PathBuf> {
    let executable = self.executable_path(resources_dir, platform);
    if executable.exists() {
      return Ok(executable);
    }

    let Some(installer) = installer else {
      return Err(Error::DependencyMissing {
        language: self.language_id().to_string(),
        reason: format!("{} is not installed and no installer is configured", executable.display()),
      });
    };

    let destination = executable
      .parent()
      .ok_or_else(|| Error::Internal("executable path has no parent".to_string()))?;
    std::fs::create_dir_all(destination)?;

    let url = self.download_url(platform)?;
    info!(language = self.language_id(), url, "Installing language server");
    installer.install(&url, destination)?;

    if !executable.exists() {
      return Err(Error::DependencyMissing {
        language: self.language_id().to_string(),
        reason: format!("installer did not produce {}", executable.display()),
      });
    }
    make_executable(&executable, platform)?;
    Ok(executable)
  }
}

/// Set the executable bit on unix-extracted server scripts
fn make_executable(path: &Path, platform: Platform) -> Result<()> {
  if platform.is_windows() {
    return Ok(());
  }
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
  }
  Ok(())
}

/// Look an executable up on PATH, honoring Windows extension conventions
pub fn find_in_path(name: &str) -> Option<PathBuf> {
  let path_var = std::env::var_os("PATH")?;
  let candidates: Vec<String> = if cfg!(windows) {
    vec![
      name.to_string(),
      format!("{}.exe", name),
      format!("{}.cmd", name),
      format!("{}.bat", name),
    ]
  } else {
    vec![name.to_string()]
  };

  for dir in std::env::split_paths(&path_var) {
    for candidate in &candidates {
      let full = dir.join(candidate);
      if full.is_file() {
        return Some(full);
      }
    }
  }
  None
}

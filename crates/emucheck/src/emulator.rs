//! The external emulator: how to build it and how to invoke it.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Default build invocation for the emulator.
pub const DEFAULT_BUILD_COMMAND: &str = "bazel build --cxxopt=-std=c++20 //src:main";

/// Default location of the built emulator binary.
pub const DEFAULT_EMULATOR: &str = "./bazel-bin/src/main";

/// Subcommand that runs a ROM and writes a screenshot.
pub const TEST_SUBCOMMAND: &str = "test";

/// External command that builds the emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl BuildCommand {
    /// Create a build command from a program and its arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl Default for BuildCommand {
    fn default() -> Self {
        // The default string is a known-good whitespace-separated command.
        DEFAULT_BUILD_COMMAND
            .parse()
            .unwrap_or_else(|_| Self::new("bazel", ["build"]))
    }
}

impl std::str::FromStr for BuildCommand {
    type Err = Error;

    /// Split on whitespace; the first word is the program.
    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| Error::InvalidBuildCommand("empty command".to_string()))?;
        Ok(Self::new(program, words))
    }
}

impl fmt::Display for BuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Run the build and wait for it.
///
/// Build output is inherited so toolchain diagnostics reach the user.
///
/// # Errors
///
/// Returns [`Error::BuildFailure`] if the build cannot be launched or exits
/// non-zero.
pub fn build_emulator(build: &BuildCommand) -> Result<()> {
    info!(command = %build, "building emulator");

    let status = build
        .to_command()
        .status()
        .map_err(|e| Error::BuildFailure {
            command: build.to_string(),
            reason: format!("failed to run: {e}"),
        })?;

    if !status.success() {
        return Err(Error::BuildFailure {
            command: build.to_string(),
            reason: status.code().map_or_else(
                || "terminated by signal".to_string(),
                |code| format!("exit code {code}"),
            ),
        });
    }

    debug!("emulator build succeeded");
    Ok(())
}

/// How to launch the emulator under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emulator {
    pub program: PathBuf,
    /// Arguments placed before the `test` subcommand (e.g. for a wrapper).
    pub launcher_args: Vec<OsString>,
}

impl Emulator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            launcher_args: Vec::new(),
        }
    }

    /// Add arguments placed before the `test` subcommand.
    #[must_use]
    pub fn with_launcher_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.launcher_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Check that the program exists, if it is given as a path.
    ///
    /// Bare names (e.g. `sh`) are resolved through `PATH` at spawn time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmulatorNotFound`] if a path-like program is missing.
    pub fn ensure_exists(&self) -> Result<()> {
        let is_path = self.program.components().count() > 1;
        if is_path && !self.program.is_file() {
            return Err(Error::EmulatorNotFound(self.program.clone()));
        }
        Ok(())
    }

    /// Command running `rom` in test mode, writing a screenshot to `image`.
    #[must_use]
    pub fn test_command(&self, rom: &Path, image: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.launcher_args)
            .arg(TEST_SUBCOMMAND)
            .arg(rom)
            .arg(image);
        cmd
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new(DEFAULT_EMULATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_command() {
        let build: BuildCommand = "bazel build  --cxxopt=-std=c++20 //src:main".parse().unwrap();
        assert_eq!(build.program, "bazel");
        assert_eq!(build.args, ["build", "--cxxopt=-std=c++20", "//src:main"]);
        assert_eq!(build.to_string(), DEFAULT_BUILD_COMMAND);
        assert_eq!(BuildCommand::default(), build);
    }

    #[test]
    fn test_parse_empty_build_command() {
        assert!(matches!(
            "   ".parse::<BuildCommand>(),
            Err(Error::InvalidBuildCommand(_))
        ));
    }

    #[test]
    fn test_emulator_command_line() {
        let emulator = Emulator::new("sh").with_launcher_args(["fake_emu.sh"]);
        let cmd = emulator.test_command(Path::new("blargg/01_a.nes"), Path::new("shots/01_a.png"));
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(cmd.get_program(), "sh");
        assert_eq!(args, ["fake_emu.sh", "test", "blargg/01_a.nes", "shots/01_a.png"]);
    }

    #[test]
    fn test_ensure_exists() {
        assert!(Emulator::new("sh").ensure_exists().is_ok());
        assert!(matches!(
            Emulator::new("./definitely/missing/emu").ensure_exists(),
            Err(Error::EmulatorNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_build_failure_is_reported() {
        let build = BuildCommand::new("sh", ["-c", "exit 2"]);
        let err = build_emulator(&build).unwrap_err();
        assert!(matches!(err, Error::BuildFailure { .. }));
        assert!(err.to_string().contains("exit code 2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_build_success() {
        assert!(build_emulator(&BuildCommand::new("true", Vec::<String>::new())).is_ok());
    }
}

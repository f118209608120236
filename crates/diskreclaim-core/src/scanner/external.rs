/// External command collaborator for developer-tool scanners.
///
/// Package-manager and container-engine introspection shells out to the
/// tool, captures stdout, and splits it on a fixed delimiter. Any failure
/// (binary missing, non-zero exit, undecodable output) degrades to
/// [`ToolReport::Unavailable`]; it never fails the surrounding scan.
use std::io;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("{program} is not installed")]
    NotInstalled { program: String },

    #[error("{program} exited with status {status}: {stderr}")]
    Failed {
        program: String,
        status: i32,
        stderr: String,
    },

    #[error("{program} produced non-UTF-8 output")]
    InvalidOutput { program: String },

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Runs an external program and returns its standard output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, ExternalError>;
}

/// Runs real processes through `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, ExternalError> {
        let output = Command::new(program).args(args).output().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ExternalError::NotInstalled {
                    program: program.to_string(),
                }
            } else {
                ExternalError::Io {
                    program: program.to_string(),
                    source,
                }
            }
        })?;

        if !output.status.success() {
            return Err(ExternalError::Failed {
                program: program.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| ExternalError::InvalidOutput {
            program: program.to_string(),
        })
    }
}

/// Split tool output into rows of trimmed fields. Blank lines are dropped.
pub fn parse_rows(stdout: &str, delimiter: char) -> Vec<Vec<String>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split(delimiter).map(|f| f.trim().to_string()).collect())
        .collect()
}

/// Outcome of probing one external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolReport<T> {
    Available(T),
    Unavailable(String),
}

impl<T> ToolReport<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    fn from_result(tool: &str, result: Result<T, ExternalError>) -> Self {
        match result {
            Ok(value) => Self::Available(value),
            Err(err) => {
                debug!("{tool} unavailable: {err}");
                Self::Unavailable(err.to_string())
            }
        }
    }
}

/// One row of container-engine disk usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerUsage {
    pub kind: String,
    pub size: String,
    pub reclaimable: String,
}

/// Container-engine disk usage (`docker system df`), one row per resource
/// type. Rows with the wrong field count are skipped.
pub fn container_usage(runner: &dyn CommandRunner) -> ToolReport<Vec<ContainerUsage>> {
    let result = runner
        .run(
            "docker",
            &["system", "df", "--format", "{{.Type}}|{{.Size}}|{{.Reclaimable}}"],
        )
        .map(|stdout| {
            parse_rows(&stdout, '|')
                .into_iter()
                .filter_map(|row| match row.as_slice() {
                    [kind, size, reclaimable] => Some(ContainerUsage {
                        kind: kind.clone(),
                        size: size.clone(),
                        reclaimable: reclaimable.clone(),
                    }),
                    _ => None,
                })
                .collect()
        });
    ToolReport::from_result("docker", result)
}

/// The package manager's download cache directory (`brew --cache`).
pub fn package_cache_dir(runner: &dyn CommandRunner) -> ToolReport<PathBuf> {
    let result = runner.run("brew", &["--cache"]).and_then(|stdout| {
        stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ExternalError::InvalidOutput {
                program: "brew".to_string(),
            })
    });
    ToolReport::from_result("brew", result)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Result<&'static str, ()>);

    impl CommandRunner for Canned {
        fn run(&self, program: &str, _args: &[&str]) -> Result<String, ExternalError> {
            self.0.map(str::to_string).map_err(|_| ExternalError::NotInstalled {
                program: program.to_string(),
            })
        }
    }

    #[test]
    fn rows_are_split_and_trimmed() {
        let rows = parse_rows("a | b|c\n\n  d|e \n", '|');
        assert_eq!(rows, vec![vec!["a", "b", "c"], vec!["d", "e"]]);
    }

    #[test]
    fn container_usage_parses_well_formed_rows() {
        let runner = Canned(Ok("Images|2.1GB|1.5GB (71%)\nContainers|10MB|0B (0%)\nbroken\n"));
        match container_usage(&runner) {
            ToolReport::Available(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].kind, "Images");
                assert_eq!(rows[1].reclaimable, "0B (0%)");
            }
            ToolReport::Unavailable(reason) => panic!("unexpected: {reason}"),
        }
    }

    #[test]
    fn missing_tool_is_unavailable_not_an_error() {
        let report = container_usage(&Canned(Err(())));
        assert_eq!(
            report,
            ToolReport::Unavailable("docker is not installed".to_string())
        );
    }

    #[test]
    fn package_cache_takes_first_line() {
        let report = package_cache_dir(&Canned(Ok("/Users/me/Library/Caches/Homebrew\n")));
        assert_eq!(
            report,
            ToolReport::Available(PathBuf::from("/Users/me/Library/Caches/Homebrew"))
        );
        assert!(!package_cache_dir(&Canned(Ok("\n"))).is_available());
    }

    #[test]
    fn system_runner_reports_missing_binary() {
        let err = SystemCommandRunner
            .run("definitely-not-a-real-binary-xyz", &[])
            .unwrap_err();
        assert!(matches!(err, ExternalError::NotInstalled { .. }));
    }
}

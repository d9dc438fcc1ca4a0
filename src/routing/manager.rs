//! Route plan execution through `ip` and `nft`

use crate::error::RouteError;
use crate::routing::{Operation, RoutePlan};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Outcome of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    pub stderr: String,
}

/// Runs external programs
pub trait CommandRunner {
    /// Run `program` with `args`, feeding `stdin` when given. Only a failure
    /// to start the program is an error; exit status is reported in the output.
    fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> impl std::future::Future<Output = Result<CommandOutput, RouteError>> + Send;
}

/// Production runner using `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner;

impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<CommandOutput, RouteError> {
        let spawn_error = |source| RouteError::Spawn {
            program: program.to_string(),
            source,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // feed stdin while stderr drains, the child may fill its stderr pipe first
        let pipe = child.stdin.take();
        let feed = async move {
            match (stdin, pipe) {
                (Some(data), Some(mut pipe)) => {
                    let written = pipe.write_all(data.as_bytes()).await;
                    // close stdin so batch mode sees EOF
                    drop(pipe);
                    written
                }
                _ => Ok(()),
            }
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(spawn_error)?;
        match fed {
            // child exited without reading all of its input, the exit status tells why
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("{} closed stdin early", program)
            }
            Err(e) => return Err(spawn_error(e)),
            Ok(()) => {}
        }

        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Runner that only prints what would be executed
#[derive(Debug, Clone, Default)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<CommandOutput, RouteError> {
        println!("{} {}", program, args.join(" "));
        if let Some(data) = stdin {
            for line in data.lines() {
                println!("    {}", line);
            }
        }
        Ok(CommandOutput {
            success: true,
            status: "dry-run".to_string(),
            stderr: String::new(),
        })
    }
}

/// One `ip` invocation derived from a plan
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Command {
        args: Vec<String>,
        /// Non-zero exit is expected when the target is already gone
        tolerate_failure: bool,
    },
    /// `ip -force -batch -` with one operation per line
    Batch { lines: Vec<String> },
}

/// Consecutive route replaces and rule adds are batched, everything else runs alone
fn plan_steps(plan: &RoutePlan) -> Vec<Step> {
    let mut steps: Vec<Step> = Vec::new();
    let mut previous: Option<&Operation> = None;

    for operation in &plan.operations {
        let batchable = matches!(
            operation,
            Operation::ReplaceRoute { .. } | Operation::AddRule { .. }
        );

        let same_kind = previous.is_some_and(|prev| {
            std::mem::discriminant(prev) == std::mem::discriminant(operation)
        });
        previous = Some(operation);

        if batchable && same_kind {
            if let Some(Step::Batch { lines }) = steps.last_mut() {
                lines.push(operation.to_string());
                continue;
            }
        }

        if batchable {
            steps.push(Step::Batch {
                lines: vec![operation.to_string()],
            });
        } else {
            steps.push(Step::Command {
                args: operation
                    .to_string()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
                tolerate_failure: matches!(operation, Operation::DeleteDefaultRoute { .. }),
            });
        }
    }
    steps
}

/// Result of applying a plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub commands: usize,
    pub failed: usize,
}

/// Applies route plans and link settings with the `ip` tool
pub struct CommandExecutor<R> {
    runner: R,
    ip: String,
    nft: String,
}

impl<R: CommandRunner + Sync> CommandExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            ip: "ip".to_string(),
            nft: "/usr/sbin/nft".to_string(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Apply every operation in order. Failed commands are logged and
    /// counted, execution continues with the next step.
    pub async fn apply(&self, plan: &RoutePlan) -> Result<ApplyReport, RouteError> {
        let mut report = ApplyReport::default();

        for step in plan_steps(plan) {
            report.commands += 1;
            let ok = match step {
                Step::Command {
                    args,
                    tolerate_failure,
                } => self.run_ip(&args, None, tolerate_failure).await?,
                Step::Batch { lines } => {
                    let mut input = lines.join("\n");
                    input.push('\n');
                    let args = vec!["-force".to_string(), "-batch".to_string(), "-".to_string()];
                    self.run_ip(&args, Some(&input), false).await?
                }
            };
            if !ok {
                report.failed += 1;
            }
        }

        Ok(report)
    }

    /// `ip link set dev <device> group <group>`
    pub async fn set_link_group(&self, device: &str, group: u32) -> Result<bool, RouteError> {
        let args: Vec<String> = ["link", "set", "dev", device, "group"]
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(group.to_string()))
            .collect();
        self.run_ip(&args, None, false).await
    }

    /// `nft -f <script>`, the script does not need the exec bit
    pub async fn load_nft_script(&self, script: &Path) -> Result<bool, RouteError> {
        let args = vec!["-f".to_string(), script.display().to_string()];
        self.run_logged(&self.nft, &args, None, false).await
    }

    async fn run_ip(
        &self,
        args: &[String],
        stdin: Option<&str>,
        tolerate_failure: bool,
    ) -> Result<bool, RouteError> {
        self.run_logged(&self.ip, args, stdin, tolerate_failure).await
    }

    async fn run_logged(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
        tolerate_failure: bool,
    ) -> Result<bool, RouteError> {
        let command = format!("{} {}", program, args.join(" "));
        info!("Call command: {}", command);
        if let Some(data) = stdin {
            debug!("Batch input:\n{}", data);
        }

        let output = self.runner.run(program, args, stdin).await?;
        if output.success {
            return Ok(true);
        }

        if tolerate_failure {
            debug!("Ignoring failure of `{}`: {}", command, output.stderr);
            return Ok(true);
        }

        let failure = RouteError::CommandFailed {
            command,
            status: output.status,
            stderr: output.stderr,
        };
        error!("{}", failure);
        Ok(false)
    }
}

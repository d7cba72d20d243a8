//! Solution verification strategies.
//!
//! Every strategy goes through the same three steps: `set_up`,
//! `run_and_capture` and `tear_down`. The only success criterion is that the
//! task's flag appears verbatim in the captured output; build failures,
//! crashes and timeouts all come out as "no match".

use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::result::{DiagnosticStage, Diagnostics};
use super::sandbox::{ContainerRun, VolumeMount};
use crate::docker::{remove_if_exists, write_override, DockerCli};
use crate::execution::run_captured;
use crate::task::{SolutionKind, SolutionSpec, Task, SOLVE_SCRIPT};

/// Where distribution files appear inside a solution container.
pub const DISTFILES_MOUNT: &str = "/distfiles";

/// Returns true when `flag` occurs literally in `output`.
///
/// Case-sensitive, unanchored substring match.
pub fn flag_matches(output: &str, flag: &str) -> bool {
    output.contains(flag)
}

/// Everything a strategy needs besides the solution itself.
#[derive(Debug, Clone, Copy)]
pub struct VerifyContext<'a> {
    /// Task being verified.
    pub task: &'a Task,
    /// Docker tooling.
    pub cli: &'a DockerCli,
    /// Isolated network of the task environment, if one is running.
    pub network: Option<&'a str>,
}

/// What running a solution produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// The process finished; combined output.
    Output(String),
    /// The deadline expired and the process was killed.
    TimedOut,
    /// The solution could not be run at all.
    Failed(String),
}

impl Capture {
    /// Whether the capture contains `flag`.
    pub fn matches(&self, flag: &str) -> bool {
        match self {
            Capture::Output(output) => flag_matches(output, flag),
            Capture::TimedOut | Capture::Failed(_) => false,
        }
    }
}

/// Builds the solution's Dockerfile and runs the image.
#[derive(Debug)]
pub struct ContainerVerifier {
    name: String,
    dir: std::path::PathBuf,
    image: String,
    built: bool,
    build_error: Option<String>,
    container: Option<String>,
    timed_out: bool,
}

impl ContainerVerifier {
    fn new(spec: &SolutionSpec) -> Self {
        Self {
            name: spec.name.clone(),
            dir: spec.dir.clone(),
            image: Uuid::new_v4().to_string(),
            built: false,
            build_error: None,
            container: None,
            timed_out: false,
        }
    }

    async fn set_up(&mut self, ctx: &VerifyContext<'_>, deadline: Instant) {
        let mut cmd = ctx.cli.docker_command();
        cmd.args(["build", ".", "-t", self.image.as_str()]).current_dir(&self.dir);
        debug!(solution = %self.name, image = %self.image, "Building solution image");

        match run_captured(cmd, Some(deadline)).await {
            Ok(out) if out.timed_out => {
                warn!(solution = %self.name, "Image build hit the deadline");
                self.build_error = Some("build timed out".to_string());
            }
            Ok(out) if out.success() => {
                debug!(solution = %self.name, "Build output:\n{}", out.text());
                self.built = true;
            }
            Ok(out) => {
                warn!(
                    solution = %self.name,
                    code = out.exit_code(),
                    "Image build failed:\n{}",
                    out.text()
                );
                self.build_error = Some(format!("build exited with code {}", out.exit_code()));
            }
            Err(e) => {
                warn!(solution = %self.name, error = %e, "Failed to start image build");
                self.build_error = Some(e.to_string());
            }
        }
    }

    async fn run_and_capture(&mut self, ctx: &VerifyContext<'_>, deadline: Instant) -> Capture {
        if let Some(ref e) = self.build_error {
            return Capture::Failed(e.clone());
        }

        let manifest = &ctx.task.manifest;
        let mut run = ContainerRun::new(self.image.clone())
            .with_network(ctx.network)
            .with_env_or_placeholder("HOST", manifest.main.clone());
        let self_name = run.name.clone();
        run = run
            .with_env("HOST-SELF", self_name)
            .with_env_or_placeholder("PORT", manifest.local_port.map(|p| p.to_string()));

        let distfiles = ctx.task.distfiles_dir();
        if distfiles.is_dir() {
            let host = std::path::absolute(&distfiles).unwrap_or(distfiles);
            run = run.with_volume(VolumeMount::readonly(host, DISTFILES_MOUNT));
        }

        let args = run.docker_run_args();
        debug!("Running: docker {}", args.join(" "));
        let mut cmd = ctx.cli.docker_command();
        cmd.args(&args).current_dir(&ctx.task.dir);
        self.container = Some(run.name);

        match run_captured(cmd, Some(deadline)).await {
            Ok(out) if out.timed_out => {
                self.timed_out = true;
                Capture::TimedOut
            }
            Ok(out) => Capture::Output(out.text()),
            Err(e) => Capture::Failed(e.to_string()),
        }
    }

    async fn tear_down(&mut self, ctx: &VerifyContext<'_>, diagnostics: &mut Diagnostics) {
        // Killing the docker client leaves the container running.
        if self.timed_out {
            if let Some(ref container) = self.container {
                if let Err(e) = ctx.cli.docker(&["rm", "-f", container]).await {
                    diagnostics.push(DiagnosticStage::ContainerRemove, e);
                }
            }
        }
        if self.built {
            if let Err(e) = ctx.cli.docker(&["rmi", &self.image]).await {
                diagnostics.push(DiagnosticStage::ImageRemove, e);
            }
        }
    }
}

/// Runs `bash solve.bash` in the solution directory.
#[derive(Debug)]
pub struct ScriptVerifier {
    name: String,
    dir: std::path::PathBuf,
    override_path: Option<std::path::PathBuf>,
}

impl ScriptVerifier {
    fn new(spec: &SolutionSpec) -> Self {
        Self {
            name: spec.name.clone(),
            dir: spec.dir.clone(),
            override_path: None,
        }
    }

    /// Scripts that drive compose themselves land on the task network.
    async fn set_up(&mut self, ctx: &VerifyContext<'_>) {
        if let Some(network) = ctx.network {
            match write_override(&self.dir, network) {
                Ok(path) => self.override_path = Some(path),
                Err(e) => warn!(solution = %self.name, error = %e, "Could not write solution override"),
            }
        }
    }

    async fn run_and_capture(&mut self, ctx: &VerifyContext<'_>, deadline: Instant) -> Capture {
        let mut cmd = Command::new("bash");
        cmd.arg(SOLVE_SCRIPT)
            .current_dir(&self.dir)
            .env("HOST", ctx.task.dir_name());

        match run_captured(cmd, Some(deadline)).await {
            Ok(out) if out.timed_out => Capture::TimedOut,
            Ok(out) => Capture::Output(out.text()),
            Err(e) => Capture::Failed(e.to_string()),
        }
    }

    async fn tear_down(&mut self, diagnostics: &mut Diagnostics) {
        if let Some(path) = self.override_path.take() {
            if let Err(e) = remove_if_exists(&path) {
                diagnostics.push(DiagnosticStage::SolutionOverrideRemove, e);
            }
        }
    }
}

/// The closed set of verification strategies.
#[derive(Debug)]
pub enum Verifier {
    Container(ContainerVerifier),
    Script(ScriptVerifier),
}

impl Verifier {
    /// Picks the strategy for a solution.
    pub fn for_solution(spec: &SolutionSpec) -> Self {
        match spec.kind {
            SolutionKind::Container => Verifier::Container(ContainerVerifier::new(spec)),
            SolutionKind::Script => Verifier::Script(ScriptVerifier::new(spec)),
        }
    }

    /// Prepares the solution. Never fails; problems surface as a failed capture.
    pub async fn set_up(&mut self, ctx: &VerifyContext<'_>, deadline: Instant) {
        match self {
            Verifier::Container(v) => v.set_up(ctx, deadline).await,
            Verifier::Script(v) => v.set_up(ctx).await,
        }
    }

    /// Runs the solution until it exits or `deadline` passes.
    pub async fn run_and_capture(&mut self, ctx: &VerifyContext<'_>, deadline: Instant) -> Capture {
        match self {
            Verifier::Container(v) => v.run_and_capture(ctx, deadline).await,
            Verifier::Script(v) => v.run_and_capture(ctx, deadline).await,
        }
    }

    /// Removes per-solution artifacts. Not bounded by the solution deadline.
    pub async fn tear_down(&mut self, ctx: &VerifyContext<'_>, diagnostics: &mut Diagnostics) {
        match self {
            Verifier::Container(v) => v.tear_down(ctx, diagnostics).await,
            Verifier::Script(v) => v.tear_down(diagnostics).await,
        }
    }

    /// Full set-up, run, tear-down cycle. Returns whether the flag was found.
    pub async fn verify(
        &mut self,
        ctx: &VerifyContext<'_>,
        deadline: Instant,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        self.set_up(ctx, deadline).await;
        let capture = self.run_and_capture(ctx, deadline).await;
        self.tear_down(ctx, diagnostics).await;

        match &capture {
            Capture::Output(output) => debug!("Solution output:\n{}", output),
            Capture::TimedOut => info!("Solution timed out"),
            Capture::Failed(e) => info!(error = %e, "Solution could not run"),
        }
        capture.matches(&ctx.task.manifest.flag)
    }
}

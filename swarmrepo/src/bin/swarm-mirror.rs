use anyhow::Context;
use clap::{Parser, Subcommand};
use std::{
    env,
    io::{
        self,
        Read,
    },
    path::{
        Path,
        PathBuf,
    },
    process::{
        self,
        Command as Process,
    },
    time::Duration,
};
use swarmcore::{
    config::MirrorConfig,
    refs::RefSpec,
    sink::ChangeSink,
    url::{
        Command,
        ExtendedUrl,
    },
};
use swarmrepo::{
    command::CommandRunner,
    config,
    fusion,
    hook::HookScript,
    mirror::{
        FetchOptions,
        FetchOutcome,
        Mirror,
        WaitPolicy,
    },
    outcome::FetchRecord,
    repo::Repo,
    socket::{
        self,
        LockRequest,
        LockSocketServer,
        PushLocking,
        NOT_MIRRORED,
        WRITE_LOCK_SOCKET,
    },
};

#[derive(Debug, Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[clap(long, value_name = "SWARM_REPOS_PATH", env = "SWARM_REPOS_PATH", default_value = ".")]
    repos_path: PathBuf,
    #[clap(long, value_name = "SWARM_MIRROR_CONFIG", env = "SWARM_MIRROR_CONFIG")]
    mirror_config: Option<PathBuf>,
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch new refs from the mirror.
    #[command(arg_required_else_help = true)]
    Fetch {
        project: String,
        /// Exit non-zero when the fetch fails.
        #[clap(long)]
        strict: bool,
        #[clap(long)]
        skip_if_pushing: bool,
        /// Skip instead of waiting for a fetch already in progress.
        #[clap(long)]
        no_wait_if_busy: bool,
        /// Skip when the last fetch is younger than this many seconds.
        #[clap(long, value_name = "SECONDS")]
        min_outdated: Option<u64>,
        /// Run the repository's post-receive hook with the fetched changes.
        #[clap(long)]
        notify: bool,
    },
    /// Push refs to the mirror; without refspecs, reads hook lines on stdin.
    #[command(arg_required_else_help = true)]
    Push {
        project: String,
        refspecs: Vec<String>,
        /// Coordinate the push lock through the receive-pack wrapper.
        #[clap(long)]
        hook: bool,
        #[clap(long, value_name = "ATTEMPTS")]
        max_wait_attempts: Option<u32>,
        #[clap(long, value_name = "SECONDS", default_value = "0")]
        wait_delay: u64,
    },
    /// Release the push lock held for this receive-pack session.
    PostReceive,
    /// Wrap `git-receive-pack`, holding the push lock on behalf of hooks.
    #[command(arg_required_else_help = true)]
    ReceivePack {
        project: String,
    },
    /// Show or set the mirror remote of a project.
    #[command(arg_required_else_help = true)]
    MirrorUrl {
        project: String,
        url: Option<String>,
    },
    /// Parse a remote URL and render it back, optionally extended.
    #[command(arg_required_else_help = true)]
    Url {
        url: String,
        #[clap(long)]
        command: Option<Command>,
        #[clap(long)]
        repo: Option<String>,
        #[clap(long)]
        extra: Option<String>,
        #[clap(long)]
        show_password: bool,
    },
    /// List the repositories a Git Fusion entry serves.
    List {
        #[clap(long)]
        id: Option<String>,
    },
    /// Report the Git Fusion version of an entry.
    Version {
        #[clap(long)]
        id: Option<String>,
        /// Minimum acceptable version, `year.release[.change]`.
        #[clap(long)]
        min: Option<String>,
    },
    /// Show the recorded outcome of the last fetch.
    #[command(arg_required_else_help = true)]
    LastFetch {
        project: String,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    stderrlog::new()
        .module(module_path!())
        .module("swarmcore")
        .module("swarmrepo")
        .verbosity((args.verbose as usize) + 1)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    let config = config::load_or_default(args.mirror_config.as_deref())?;
    let runner = CommandRunner::new();

    match args.command {
        Commands::Fetch { project, strict, skip_if_pushing, no_wait_if_busy, min_outdated, notify } => {
            let path = project_path(&args.repos_path, &project);
            let options = FetchOptions {
                skip_if_pushing,
                wait_if_busy: !no_wait_if_busy,
                min_outdated: min_outdated.map(Duration::from_secs),
            };
            let hook = HookScript::post_receive(&path);
            let mirror = Mirror::new(Repo::new(&path, &runner).with_config(&config))
                .with_echo(true);
            let mirror = if notify {
                mirror.with_sink(&hook as &dyn ChangeSink)
            } else {
                mirror
            };
            if strict {
                report_fetch(&mirror.require_fetch(&options)?);
            } else {
                match mirror.fetch(&options) {
                    Ok(outcome) => report_fetch(&outcome),
                    Err(e) => log::error!("fetch of {project} failed: {e}"),
                }
            }
        }
        Commands::Push { project, refspecs, hook, max_wait_attempts, wait_delay } => {
            let path = project_path(&args.repos_path, &project);
            let mirror = Mirror::new(Repo::new(&path, &runner).with_config(&config))
                .with_echo(true)
                .with_wait_policy(WaitPolicy {
                    max_attempts: max_wait_attempts,
                    delay: Duration::from_secs(wait_delay),
                });
            let locking = if hook {
                PushLocking::from_env()?
            } else {
                PushLocking::Direct
            };
            let op = if refspecs.is_empty() {
                let mut input = String::new();
                io::stdin().read_to_string(&mut input)?;
                mirror.push_change_lines(&input, &locking)?
            } else {
                let refs = refspecs.iter()
                    .map(|spec| spec.parse::<RefSpec>())
                    .collect::<Result<Vec<_>, _>>()?;
                mirror.push(&refs, &locking)?
            };
            log::info!("push of {} ref(s) finished: {:?}", op.refs.len(), op.status);
        }
        Commands::PostReceive => {
            // hooks run outside the wrapper have nothing to release
            if env::var_os(WRITE_LOCK_SOCKET).is_none() {
                log::debug!("{WRITE_LOCK_SOCKET} not set; nothing to unlock");
                return Ok(());
            }
            if let PushLocking::Socket(path) = PushLocking::from_env()? {
                socket::request(&path, LockRequest::Unlock)?;
            }
        }
        Commands::ReceivePack { project } => {
            let path = project_path(&args.repos_path, &project);
            let code = receive_pack(&path, &runner, &config)?;
            process::exit(code);
        }
        Commands::MirrorUrl { project, url } => {
            let path = project_path(&args.repos_path, &project);
            let repo = Repo::new(&path, &runner).with_config(&config);
            match url {
                Some(url) => repo.set_mirror_url(&url)?,
                None => match repo.mirror_url()? {
                    Some(url) => println!("{}", display_url(&url)),
                    None => println!("{project} is not mirrored"),
                },
            }
        }
        Commands::Url { url, command, repo, extra, show_password } => {
            let mut parsed = ExtendedUrl::parse(&url)?;
            if let Some(command) = command {
                parsed = parsed.with_command(command);
            }
            if let Some(repo) = repo {
                parsed = parsed.with_repo(repo)?;
            }
            if let Some(extra) = extra {
                parsed = parsed.with_extra(extra);
            }
            println!("{}", parsed.to_string(!show_password)?);
        }
        Commands::List { id } => {
            let target = config.entry(id.as_deref())?.target()?;
            for (name, description) in fusion::list_repos(&runner, &target)? {
                println!("{name}\t{description}");
            }
        }
        Commands::Version { id, min } => {
            let target = config.entry(id.as_deref())?.target()?;
            let version = fusion::version(&runner, &target)?;
            match min {
                Some(min) => {
                    let check = fusion::check_version(version, &min)?;
                    println!("{version}{}", if check.outdated { " (outdated)" } else { "" });
                    if check.outdated {
                        process::exit(1);
                    }
                }
                None => println!("{version}"),
            }
        }
        Commands::LastFetch { project } => {
            let record = FetchRecord::new(&project_path(&args.repos_path, &project));
            match record.last_attempt()? {
                Some(when) => println!("last fetch: {}", when.to_rfc3339()),
                None => println!("last fetch: never"),
            }
            if let Some(error) = record.last_error()? {
                println!("last error: {error}");
            }
        }
    }

    Ok(())
}

/// Resolves a project name under the repositories root.
fn project_path(repos_path: &Path, project: &str) -> PathBuf {
    let project = project.trim_matches('/');
    if project.ends_with(".git") {
        repos_path.join(project)
    } else {
        repos_path.join(format!("{project}.git"))
    }
}

fn display_url(url: &str) -> String {
    ExtendedUrl::parse(url)
        .and_then(|url| url.to_string(true))
        .unwrap_or_else(|_| url.to_string())
}

fn report_fetch(outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::NotMirrored => log::debug!("not mirrored; nothing fetched"),
        FetchOutcome::Skipped => log::info!("fetch skipped"),
        FetchOutcome::Fetched(changes) => log::info!("fetched {} ref change(s)", changes.len()),
        FetchOutcome::Reused { last_error: None } => log::info!("reused a concurrent fetch"),
        FetchOutcome::Reused { last_error: Some(e) } | FetchOutcome::Failed(e) => {
            log::error!("fetch failed: {e}")
        }
    }
}

/// Brings the project up to date, then runs `git-receive-pack` with the
/// lock socket published to its hooks.
fn receive_pack(
    path: &Path,
    runner: &CommandRunner,
    config: &MirrorConfig,
) -> anyhow::Result<i32> {
    // stdout carries the pack protocol, so nothing may be echoed to it
    let mirror = Mirror::new(Repo::new(path, runner).with_config(config));
    mirror.require_fetch(&FetchOptions::default())?;

    let mut server = if mirror.repo().is_mirrored()? {
        Some(LockSocketServer::bind(path)
            .with_context(|| format!("binding lock socket in {}", path.display()))?)
    } else {
        None
    };
    let socket_value = server.as_ref()
        .map(LockSocketServer::env_value)
        .unwrap_or_else(|| NOT_MIRRORED.to_string());

    let status = Process::new("git-receive-pack")
        .arg(path)
        .env(WRITE_LOCK_SOCKET, socket_value)
        .status()
        .context("running git-receive-pack")?;
    if let Some(server) = server.as_mut() {
        server.stop()?;
    }
    Ok(status.code().unwrap_or(-1))
}

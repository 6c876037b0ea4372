use clap::Clap;
use std::ffi::OsString;

#[derive(Debug)]
struct EnvItem {
    name: OsString,
    value: OsString,
}

fn parse_env_item(src: &str) -> Result<EnvItem, &'static str> {
    let p = src.find('=').ok_or("env item doesn't look like KEY=VAL")?;
    Ok(EnvItem {
        name: OsString::from(&src[0..p]),
        value: OsString::from(&src[p + 1..]),
    })
}

#[derive(Clap, Debug)]
struct ExecOpt {
    /// Full path of the executable to run (e.g. /bin/ls)
    #[clap(name = "bin")]
    executable: String,

    /// Arguments for the child process
    #[clap(short = 'a', long = "arg")]
    argv: Vec<String>,

    /// Environment variables (KEY=VAL) passed to the child; absent means inherit
    #[clap(short = 'e', long, parse(try_from_str = parse_env_item))]
    env: Vec<EnvItem>,

    /// Working directory for the child, default is the caller's cwd
    #[clap(short = 'd', long = "dir")]
    working_directory: Option<String>,

    /// Spawn and return immediately without waiting for the child
    #[clap(long)]
    detach: bool,

    /// Print the captured result as JSON instead of echoing stdout/stderr directly
    #[clap(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let options: ExecOpt = Clap::parse();

    let mut request = exec_core::SpawnRequest::new(options.executable);
    request.arguments = options.argv.into_iter().map(Into::into).collect();
    if !options.env.is_empty() {
        request.environment = exec_core::Environment::Replace(
            options.env.into_iter().map(|e| (e.name, e.value)).collect(),
        );
    }
    if let Some(dir) = options.working_directory {
        request.working_directory = Some(dir.into());
    }

    if options.detach {
        let pid = exec_core::run_detached(request)?;
        println!("spawned detached pid {pid}");
        return Ok(());
    }

    let (stdout_bytes, stderr_bytes, status) = exec_core::run_captured(request).await?;

    if options.json {
        #[cfg(feature = "json")]
        {
            let payload = serde_json::json!({
                "status": status,
                "stdout_len": stdout_bytes.len(),
                "stderr_len": stderr_bytes.len(),
            });
            println!("{payload}");
        }
        #[cfg(not(feature = "json"))]
        {
            anyhow::bail!("--json requires exec-cli to be built with the `json` feature");
        }
    } else {
        use std::io::Write;
        std::io::stdout().write_all(&stdout_bytes)?;
        std::io::stderr().write_all(&stderr_bytes)?;
        eprintln!("---> child process terminated: {status:?} <---");
    }

    if !status.success() {
        std::process::exit(1);
    }
    Ok(())
}

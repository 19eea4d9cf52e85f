use clap::Parser;

use crate::command::{Cli, Command, Error};
use crate::flock::Flock;
use crate::supfile::{EnvList, Supfile};


pub async fn run() -> Result<(), Error> {
    let args = Cli::parse();
    let supfile = Supfile::load(&args.supfile)?;

    match args.command {
        Command::Run { network, commands } => {
            let mut overrides = EnvList::default();
            for (key, value) in args.env {
                overrides.set(key, value);
            }

            let flock = Flock::new()
                .debug(args.debug)
                .fail_fast(!args.keep_going);

            // Dropping the run aborts every in-flight dispatch.
            tokio::select! {
                result = flock.run(&supfile, &network, &commands, &overrides) => result?,
                _ = tokio::signal::ctrl_c() => return Err(Error::Interrupted),
            }
        }
        Command::List { network } => {
            list(&supfile, network.as_deref())?;
        }
    }
    Ok(())
}


fn list(supfile: &Supfile, network: Option<&str>) -> Result<(), Error> {
    match network {
        Some(name) => {
            for host in &supfile.network(name)?.hosts {
                println!("{}", host);
            }
        }
        None => {
            println!("Networks:");
            for (name, net) in &supfile.networks {
                println!("  {:<20} {} host(s)", name, net.hosts.len());
            }
            println!("Commands:");
            for (name, cmd) in &supfile.commands {
                println!("  {:<20} {}", name, cmd.desc.as_deref().unwrap_or(""));
            }
            println!("Targets:");
            for (name, commands) in &supfile.targets {
                println!("  {:<20} {}", name, commands.join(" "));
            }
        }
    }
    Ok(())
}

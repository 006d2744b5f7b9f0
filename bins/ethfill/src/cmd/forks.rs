use clap::Parser;
use forks::{ForkCriteria, ForkRegistry};
use std::fmt::Write;

/// `forks` subcommand
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Also list the fork transitions
    #[arg(short, long)]
    transitions: bool,
}

impl Cmd {
    /// Runs `forks` command.
    pub fn run(&self) {
        print!("{}", self.render(ForkRegistry::mainnet()));
    }

    fn render(&self, registry: &ForkRegistry) -> String {
        let mut out = String::new();
        for fork in registry.iter() {
            let ignored = if fork.is_ignored() { " (ignored)" } else { "" };
            let _ = writeln!(
                out,
                "{:<18} {:<18} {}{ignored}",
                fork.name(),
                fork.t8n_name(),
                criteria(fork.criteria())
            );
        }
        if self.transitions {
            out.push('\n');
            for t in registry.transitions() {
                let _ = writeln!(out, "{:<36} {} -> {} {}", t.name, t.from, t.to, criteria(t.at));
            }
        }
        out
    }
}

fn criteria(criteria: ForkCriteria) -> String {
    match criteria {
        ForkCriteria::Block(n) => format!("block {n}"),
        ForkCriteria::Timestamp(t) => format!("time {t}"),
        ForkCriteria::Unscheduled => "unscheduled".into(),
    }
}

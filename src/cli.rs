use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(name = "tg-gatekeeper")]
#[command(author, version, about = "Telegram bot that registers its users and groups in MongoDB", long_about = None)]
pub struct Cli {
    /// Validate configuration, print it with secrets masked, and exit
    #[arg(long)]
    pub config_only: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use clap::Parser;

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level.clone()),
    )
    .init();
    match cli.command {
        Some(Commands::Mount {
            root_name,
            root_version,
            mountpoint,
            mmap,
        }) => handlers::handle_mount(cli.dbfile, root_name, root_version, mountpoint, mmap),
        Some(Commands::Ingest {
            root_name,
            root_version,
            source,
            hash,
            rehydrate,
            chunking,
            codec,
        }) => handlers::handle_ingest(
            cli.dbfile,
            root_name,
            root_version,
            source,
            hash,
            rehydrate,
            chunking,
            codec,
        ),
        Some(Commands::Train {
            name,
            version,
            chunking,
            codec,
            sources,
            max_dict_size,
        }) => handlers::handle_train(
            cli.dbfile,
            name,
            version,
            chunking,
            codec,
            sources,
            max_dict_size,
        ),
        Some(Commands::List) | None => handlers::handle_list(cli.dbfile),
    }
}

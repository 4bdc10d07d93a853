use clap::{Parser, Subcommand};
use std::path::PathBuf;
use zipfix::{ArchiveOptions, CompressionMethod};

/// Rewrite zip archives so every local header carries its sizes inline
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite an existing archive, source and target may be the same file
    Process { source: PathBuf, target: PathBuf },

    /// Zip a file or directory and rewrite the result
    Archive {
        source: PathBuf,
        target: PathBuf,

        /// Name entries relative to the source directory
        #[arg(long)]
        exclude_base_dir: bool,

        /// Leave data descriptors in place
        #[arg(long)]
        unprocessed: bool,

        /// Store entries without compression
        #[arg(long)]
        store: bool,

        /// Deflate level (0-9)
        #[arg(long, default_value_t = 6)]
        level: u32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Process { source, target } => {
            zipfix::process(&source, &target)?;
            println!("{} -> {}", source.display(), target.display());
        }
        Command::Archive {
            source,
            target,
            exclude_base_dir,
            unprocessed,
            store,
            level,
        } => {
            let method = if store {
                CompressionMethod::Store
            } else {
                CompressionMethod::Deflate
            };

            let options = ArchiveOptions::new()
                .exclude_base_dir(exclude_base_dir)
                .compression_method(method)
                .compression_level(level);

            if unprocessed {
                zipfix::archive_unprocessed(&source, &target, options)?;
            } else {
                zipfix::archive(&source, &target, options)?;
            }
            println!("{} -> {}", source.display(), target.display());
        }
    }

    Ok(())
}

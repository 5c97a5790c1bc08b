//! `fsctl` — a command-line front end over [`blockfs`], mirroring the
//! reference driver's one-shot-per-invocation shape: open (or create) a
//! disk image, perform a single operation, flush, exit.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use blockfs::FileSystem;
use clap::{Parser, Subcommand};
use vdisk::FileBlockDevice;

#[derive(Parser, Debug)]
#[command(name = "fsctl", about = "Inspect and manipulate a blockfs disk image")]
struct Cli {
    /// Path to the disk image file.
    #[arg(short, long)]
    image: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates a new disk image of `blocks` blocks and formats it.
    Format {
        /// Total number of blocks on the new disk image.
        #[arg(short, long)]
        blocks: u32,
    },
    /// Prints the superblock layout of an already-formatted image.
    Stat,
    /// Creates an empty file.
    Create {
        path: String,
    },
    /// Creates an empty directory.
    Mkdir {
        path: String,
    },
    /// Removes a file or directory (recursively, if a directory).
    Rm {
        path: String,
    },
    /// Lists the entries of a directory.
    Ls {
        path: String,
    },
    /// Prints a file's contents to stdout.
    Cat {
        path: String,
    },
    /// Writes stdin to a file, overwriting from the start (or from
    /// `--append` if given).
    Write {
        path: String,
        #[arg(long)]
        append: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("fsctl: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(cli: Cli) -> Result<(), blockfs::Error> {
    if let Command::Format { blocks } = cli.command {
        let device = FileBlockDevice::init(&cli.image, blocks)?;
        let mut fs = FileSystem::new(device);
        fs.format()?;
        fs.mount()?;
        let stat = fs.stat().expect("just mounted");
        println!(
            "formatted {} blocks, {} inodes, data region starts at block {}",
            stat.blocks_count, stat.inodes_count, stat.data_blocks_start
        );
        fs.unmount()?;
        return Ok(());
    }

    let probe_size = probe_block_count(&cli.image)?;
    let device = FileBlockDevice::open(&cli.image, probe_size)?;
    let mut fs = FileSystem::new(device);
    fs.mount()?;

    match cli.command {
        Command::Format { .. } => unreachable!("handled above"),
        Command::Stat => {
            let stat = fs.stat().expect("just mounted");
            println!("blocks:            {}", stat.blocks_count);
            println!("inodes:            {}", stat.inodes_count);
            println!("inode table start: {}", stat.inode_table_start);
            println!("data blocks start: {}", stat.data_blocks_start);
        }
        Command::Create { path } => {
            fs.create(&path, false)?;
            println!("created {path}");
        }
        Command::Mkdir { path } => {
            fs.create(&path, true)?;
            println!("created directory {path}");
        }
        Command::Rm { path } => {
            fs.remove(&path)?;
            println!("removed {path}");
        }
        Command::Ls { path } => {
            for entry in fs.list(&path)? {
                println!("{} {}", entry.name, entry.size);
            }
        }
        Command::Cat { path } => {
            let mut offset = 0u64;
            let mut buf = [0u8; blockfs::BLOCK_SIZE];
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            loop {
                let n = fs.read(&path, &mut buf, offset)?;
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n]).expect("stdout write");
                offset += n as u64;
            }
        }
        Command::Write { path, append } => {
            let mut data = Vec::new();
            std::io::stdin().read_to_end(&mut data).expect("stdin read");
            if append {
                fs.append(&path, &data)?;
            } else {
                fs.write(&path, &data, 0)?;
            }
            println!("wrote {} bytes to {path}", data.len());
        }
    }

    fs.unmount()?;
    Ok(())
}

/// Reads the candidate block count off the image's own superblock before
/// `FileBlockDevice::open` can be handed one — `open` needs a block count
/// up front, and the superblock is the only place that count is recorded.
fn probe_block_count(path: &std::path::Path) -> Result<u32, blockfs::Error> {
    let len = std::fs::metadata(path)
        .map_err(vdisk::Error::from)?
        .len();
    Ok((len / blockfs::BLOCK_SIZE as u64) as u32)
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hashchain_core::{
    constants::POW_DEFAULT_DIFFICULTY, validate_blocks, Block, BlockSnapshot, Difficulty, Ledger,
};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "hashchain")]
#[command(about = "Mine and verify a proof-of-work hash chain")]
struct Cli {
    /// Leading zero hex digits a proof digest must have
    #[arg(
        long,
        global = true,
        default_value_t = POW_DEFAULT_DIFFICULTY,
        value_parser = clap::value_parser!(u8).range(1..=64)
    )]
    difficulty: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read miner names from stdin and mine one block for each
    Mine {
        /// Emit the chain as JSON lines (genesis first, then each new block)
        #[arg(long)]
        json: bool,
        /// Print only the newly mined block instead of the whole chain
        #[arg(long)]
        quiet: bool,
    },
    /// Mine a fixed number of blocks and validate the result
    Demo {
        #[arg(long, default_value_t = 3)]
        blocks: u32,
        #[arg(long, default_value = "miner")]
        miner: String,
        /// Peer address to record (repeatable)
        #[arg(long = "node")]
        nodes: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Validate a chain given as JSON lines of block snapshots
    Verify {
        /// Input file; stdin when absent or `-`
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let difficulty = Difficulty::new(cli.difficulty).context("difficulty out of range")?;
    match cli.cmd {
        Command::Mine { json, quiet } => mine(difficulty, json, quiet),
        Command::Demo {
            blocks,
            miner,
            nodes,
            json,
        } => demo(difficulty, blocks, &miner, nodes, json),
        Command::Verify { file } => verify(difficulty, file),
    }
}

fn print_json(out: &mut impl Write, block: &Block) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string(&block.snapshot())?)?;
    Ok(())
}

fn print_chain(out: &mut impl Write, ledger: &Ledger) -> Result<()> {
    for block in ledger.chain() {
        writeln!(out, "{block}")?;
    }
    Ok(())
}

fn mine(difficulty: Difficulty, json: bool, quiet: bool) -> Result<()> {
    let mut ledger = Ledger::with_difficulty(difficulty);
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        print_json(&mut out, ledger.latest_block())?;
    }

    let mut lines = stdin.lock().lines();
    loop {
        eprint!("Enter Name of Miner: ");
        io::stderr().flush()?;
        let Some(line) = lines.next() else {
            eprintln!();
            break;
        };
        let name = line.context("failed to read miner name")?;
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        ledger.mine_block(name);
        if json {
            print_json(&mut out, ledger.latest_block())?;
        } else if quiet {
            writeln!(out, "{}", ledger.latest_block())?;
        } else {
            print_chain(&mut out, &ledger)?;
        }
        out.flush()?;
    }
    Ok(())
}

fn demo(difficulty: Difficulty, blocks: u32, miner: &str, nodes: Vec<String>, json: bool) -> Result<()> {
    let mut ledger = Ledger::with_difficulty(difficulty);
    for address in nodes {
        ledger.register_node(address);
    }
    for _ in 0..blocks {
        ledger.mine_block(miner);
    }
    ledger.validate_chain()?;

    let mut out = io::stdout().lock();
    if json {
        for block in ledger.chain() {
            print_json(&mut out, block)?;
        }
    } else {
        print_chain(&mut out, &ledger)?;
        writeln!(out, "chain valid: {} blocks", ledger.block_count())?;
        for address in ledger.nodes().iter() {
            writeln!(out, "node: {address}")?;
        }
    }
    Ok(())
}

fn read_snapshots(reader: impl BufRead) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", n + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let snapshot =
            BlockSnapshot::from_json(&line).with_context(|| format!("line {}", n + 1))?;
        blocks.push(Ledger::reconstruct_block(snapshot));
    }
    Ok(blocks)
}

fn verify(difficulty: Difficulty, file: Option<PathBuf>) -> Result<()> {
    let blocks = match file {
        Some(path) if path.as_os_str() != "-" => {
            let f = File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            read_snapshots(BufReader::new(f))?
        }
        _ => read_snapshots(io::stdin().lock())?,
    };
    if blocks.is_empty() {
        bail!("no blocks to verify");
    }
    info!(blocks = blocks.len(), %difficulty, "verifying chain");
    validate_blocks(&blocks, difficulty)?;
    println!("valid: {} blocks", blocks.len());
    Ok(())
}

//! Inspects the RocksDB store of a piChain node.
use clap::Parser;
use easy_repl::{command, CommandStatus, Repl};
use rocksdb::{Direction, IteratorMode, DB};

#[derive(Parser, Debug, Clone)]
#[command()]
pub(crate) struct Args {
    #[clap(short, long)]
    pub(crate) db_path: String,
}

fn main() {
    let db_path = Args::parse().db_path;

    let db = match DB::open_for_read_only(&rocksdb::Options::default(), &db_path, false) {
        Ok(db) => db,
        Err(err) => {
            eprintln!("Failed to open {db_path}: {err}");
            std::process::exit(1);
        }
    };

    println!("Available prefixes for get and list commands:");
    println!("  - block:<creator>-<counter> (or block:genesis)");
    println!("  - state:head_block, state:committed_block, state:committed_blocks");
    println!("  - state:s_max_block_depth, state:s_prop_block, state:s_supp_block");
    println!("  - state:counter, state:genesis");

    let mut repl = Repl::builder()
        .add(
            "get",
            command! {
                "Get a value",
                (key: String) => |key| {
                    match db.get(key.as_bytes()) {
                        Ok(Some(value)) => println!("{}", String::from_utf8_lossy(&value)),
                        Ok(None) => println!("Key not found"),
                        Err(err) => println!("Error: {err}"),
                    }
                    Ok(CommandStatus::Done)
                }
            },
        )
        .add(
            "list",
            command! {
                "List keys starting with a prefix",
                (prefix: String) => |prefix| {
                    let iter = db.iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
                    for item in iter {
                        match item {
                            Ok((key, _)) if key.starts_with(prefix.as_bytes()) => {
                                println!("{}", String::from_utf8_lossy(&key));
                            }
                            Ok(_) => break,
                            Err(err) => {
                                println!("Error: {err}");
                                break;
                            }
                        }
                    }
                    Ok(CommandStatus::Done)
                }
            },
        )
        .build()
        .expect("Failed to create repl");

    repl.run().expect("Critical REPL error");
}

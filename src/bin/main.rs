use std::io::Write;

use fat32::{path, ClusterNumber, Error, Volume};

/// Dummy type to help us implement a logger using the `log` crate.
struct Logger;

static LOGGER: Logger = Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let color = match record.level() {
                log::Level::Error => "\x1b[31m",
                log::Level::Warn => "\x1b[33m",
                log::Level::Info => "\x1b[32m",
                log::Level::Debug | log::Level::Trace => "\x1b[37m",
            };
            eprintln!("{color}[{}]\x1b[0m {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn init_logging(verbose: bool) {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
}

const USAGE: &str = "[-v] <disk_file> [info | ls [path] | tree [path] | cat <path> | touch <path>]";

fn main() {
    // Get command line arguments, including a FAT disk file
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|arg| arg == "-v");
    let args: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|&arg| arg != "-v")
        .collect();
    let (disk_file, command, argument) = match &args[..] {
        [_, disk_file] => (*disk_file, "info", None),
        [_, disk_file, command] => (*disk_file, *command, None),
        [_, disk_file, command, argument] => (*disk_file, *command, Some(*argument)),
        _ => {
            eprintln!("Usage: {} {USAGE}", args[0]);
            std::process::exit(1);
        }
    };
    init_logging(verbose);

    let image = std::fs::read(disk_file).expect("failed to read disk file");
    let mut volume = Volume::mount(image).expect("failed to mount FAT32 volume");

    let result = match (command, argument) {
        ("info", None) => info(&volume),
        ("ls", path) => list(&volume, path.unwrap_or(".")),
        ("tree", path) => tree(&volume, path.unwrap_or(".")),
        ("cat", Some(path)) => cat(&volume, path),
        ("touch", Some(path)) => volume.create_file(&path::normalize(path)).map(|created| {
            println!("created {}", created.entry.name());
        }),
        _ => {
            eprintln!("Usage: {} {USAGE}", args[0]);
            std::process::exit(1);
        }
    };
    if let Err(err) = result {
        eprintln!("{disk_file}: {err}");
        std::process::exit(1);
    }

    if command == "touch" {
        std::fs::write(disk_file, volume.into_image()).expect("failed to write disk file");
    }
}

fn info(volume: &Volume<Vec<u8>>) -> Result<(), Error> {
    println!("BIOS parameter block: {:#X?}", volume.parameter_block());
    println!("Geometry: {:#?}", volume.geometry());
    println!("Free clusters: {}", volume.free_cluster_count()?);
    Ok(())
}

fn list(volume: &Volume<Vec<u8>>, path: &str) -> Result<(), Error> {
    let directory = volume.resolve_directory(path)?;
    for item in volume.read_dir(directory) {
        let (_, entry) = item?;
        if !entry.is_visible() {
            continue;
        }
        let suffix = if entry.is_dir() { "/" } else { "" };
        println!("{:>10}  {}{suffix}", entry.file_size(), entry.name());
    }
    Ok(())
}

fn tree(volume: &Volume<Vec<u8>>, path: &str) -> Result<(), Error> {
    println!("{}", path::absolute_path(volume.current_directory(), Some(path)));
    walk(volume, volume.resolve_directory(path)?, 1)
}

fn walk(volume: &Volume<Vec<u8>>, directory: ClusterNumber, depth: usize) -> Result<(), Error> {
    for item in volume.read_dir(directory) {
        let (_, entry) = item?;
        if !entry.is_visible() || entry.name().matches(".") || entry.name().matches("..") {
            continue;
        }
        println!("{:indent$}{}", "", entry.name(), indent = depth * 2);
        if let Some(subdirectory) = entry.subdirectory() {
            walk(volume, subdirectory, depth + 1)?;
        }
    }
    Ok(())
}

fn cat(volume: &Volume<Vec<u8>>, path: &str) -> Result<(), Error> {
    let path = path::absolute_path(volume.current_directory(), Some(path));
    let lookup = volume.find(&path, volume.root_cluster())?;
    let entry = match lookup.found {
        Some(found) if !found.entry.is_dir() && !lookup.trailing_element => found.entry,
        _ => return Err(Error::NoSuchEntry),
    };

    let mut fd = volume.open_descriptor(&entry);
    let mut buf = vec![0u8; volume.bytes_per_cluster()];
    let mut stdout = std::io::stdout().lock();
    loop {
        let n = fd.read(volume, &mut buf)?;
        if n == 0 {
            break;
        }
        stdout.write_all(&buf[..n]).expect("failed to write to stdout");
    }
    Ok(())
}
